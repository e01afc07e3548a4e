// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
use std::any::Any;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, UInt32Array};
use arrow::datatypes::DataType;
use arrow_buffer::{BooleanBufferBuilder, NullBuffer};

use crate::batch::AggBatch;
use crate::options::ScalarAggregateOptions;
use crate::Result;

use super::visit::visit_grouped_booleans;
use super::{check_mapping, downcast_peer, GroupedAggregator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanAggKind {
    Any,
    All,
}

/// Boolean lattice reducers. A null only nulls the group when the
/// observed values leave the result undetermined: a seen `true`
/// already decides Any, a seen `false` already decides All.
pub struct GroupedBooleanAgg {
    kind: BooleanAggKind,
    options: ScalarAggregateOptions,
    reduced: BooleanBufferBuilder,
    no_nulls: BooleanBufferBuilder,
    counts: Vec<i64>,
}

impl GroupedBooleanAgg {
    pub fn new(kind: BooleanAggKind, options: ScalarAggregateOptions) -> Self {
        Self {
            kind,
            options,
            reduced: BooleanBufferBuilder::new(0),
            no_nulls: BooleanBufferBuilder::new(0),
            counts: Vec::new(),
        }
    }

    fn identity(&self) -> bool {
        match self.kind {
            BooleanAggKind::Any => false,
            BooleanAggKind::All => true,
        }
    }

    fn update(kind: BooleanAggKind, reduced: &mut BooleanBufferBuilder, g: usize, value: bool) {
        match kind {
            BooleanAggKind::Any => {
                if value {
                    reduced.set_bit(g, true);
                }
            }
            BooleanAggKind::All => {
                if !value {
                    reduced.set_bit(g, false);
                }
            }
        }
    }
}

impl GroupedAggregator for GroupedBooleanAgg {
    fn resize(&mut self, new_num_groups: usize) -> Result<()> {
        let added = new_num_groups - self.counts.len();
        self.reduced.append_n(added, self.identity());
        self.no_nulls.append_n(added, true);
        self.counts.resize(new_num_groups, 0);
        Ok(())
    }

    fn consume(&mut self, batch: &AggBatch) -> Result<()> {
        let kind = self.kind;
        let reduced = &mut self.reduced;
        let no_nulls = &mut self.no_nulls;
        let counts = &mut self.counts;
        visit_grouped_booleans(batch, |g, v| {
            let g = g as usize;
            match v {
                Some(v) => {
                    counts[g] += 1;
                    Self::update(kind, reduced, g, v);
                }
                None => no_nulls.set_bit(g, false),
            }
        })
    }

    fn merge(
        &mut self,
        other: Box<dyn GroupedAggregator>,
        group_id_mapping: &UInt32Array,
    ) -> Result<()> {
        let other = downcast_peer::<Self>(other)?;
        let mapping = check_mapping(group_id_mapping, other.counts.len(), self.counts.len())?;
        for (other_g, &g) in mapping.iter().enumerate() {
            let g = g as usize;
            self.counts[g] += other.counts[other_g];
            Self::update(self.kind, &mut self.reduced, g, other.reduced.get_bit(other_g));
            let both = self.no_nulls.get_bit(g) && other.no_nulls.get_bit(other_g);
            self.no_nulls.set_bit(g, both);
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<ArrayRef> {
        let num_groups = self.counts.len();
        let reduced = self.reduced.finish();
        let no_nulls = self.no_nulls.finish();

        let mut validity = BooleanBufferBuilder::new(num_groups);
        let mut any_null = false;
        for g in 0..num_groups {
            let mut valid = self.counts[g] >= self.options.min_count as i64;
            if !self.options.skip_nulls {
                // A determined result survives nulls.
                let determined = match self.kind {
                    BooleanAggKind::Any => reduced.value(g),
                    BooleanAggKind::All => !reduced.value(g),
                };
                valid = valid && (no_nulls.value(g) || determined);
            }
            any_null |= !valid;
            validity.append(valid);
        }

        let nulls = any_null.then(|| NullBuffer::new(validity.finish()));
        Ok(Arc::new(BooleanArray::new(reduced, nulls)))
    }

    fn out_type(&self) -> DataType {
        DataType::Boolean
    }

    fn num_groups(&self) -> usize {
        self.counts.len()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

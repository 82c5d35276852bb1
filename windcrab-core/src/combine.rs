//! Incremental combine functions used to accumulate window contents.
//!
//! Only the accumulator is stored per (key, window), so state stays `O(1)`
//! regardless of how many elements a window receives. Merging accumulators is
//! what lets session windows coalesce without replaying their elements.

use std::marker::PhantomData;

use crate::types::StreamData;

/// Incremental aggregation: create, add, merge, extract.
///
/// `merge_accumulators` must be associative and commutative, since the
/// order in which windows merge is not fixed.
pub trait CombineFn<IN, ACC, OUT>: Send {
    /// Create a fresh accumulator for a new pane.
    fn create_accumulator(&self) -> ACC;
    /// Fold one element into the accumulator.
    fn add_input(&self, acc: ACC, input: &IN) -> ACC;
    /// Merge several accumulators into one.
    fn merge_accumulators(&self, accs: Vec<ACC>) -> ACC;
    /// Compute the pane value from the accumulator without consuming it.
    fn extract_output(&self, acc: &ACC) -> OUT;
}

/// Adapts an associative binary reduce `Fn(T, T) -> T` into a [`CombineFn`].
///
/// The accumulator is `Option<T>`: `None` until the first element arrives. An
/// empty pane extracts to `None`.
pub struct ReduceFn<T, F> {
    reduce: F,
    _phantom: PhantomData<fn(T) -> T>,
}

impl<T, F> ReduceFn<T, F>
where
    T: StreamData,
    F: Fn(T, T) -> T + Send,
{
    pub fn new(reduce: F) -> Self {
        Self {
            reduce,
            _phantom: PhantomData,
        }
    }
}

impl<T, F> CombineFn<T, Option<T>, Option<T>> for ReduceFn<T, F>
where
    T: StreamData,
    F: Fn(T, T) -> T + Send,
{
    fn create_accumulator(&self) -> Option<T> {
        None
    }

    fn add_input(&self, acc: Option<T>, input: &T) -> Option<T> {
        match acc {
            Some(acc) => Some((self.reduce)(acc, input.clone())),
            None => Some(input.clone()),
        }
    }

    fn merge_accumulators(&self, accs: Vec<Option<T>>) -> Option<T> {
        accs.into_iter()
            .flatten()
            .reduce(|a, b| (self.reduce)(a, b))
    }

    fn extract_output(&self, acc: &Option<T>) -> Option<T> {
        acc.clone()
    }
}

/// Sums `i64` inputs. An empty pane extracts to 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct SumI64;

impl CombineFn<i64, i64, i64> for SumI64 {
    fn create_accumulator(&self) -> i64 {
        0
    }

    fn add_input(&self, acc: i64, input: &i64) -> i64 {
        acc + input
    }

    fn merge_accumulators(&self, accs: Vec<i64>) -> i64 {
        accs.into_iter().sum()
    }

    fn extract_output(&self, acc: &i64) -> i64 {
        *acc
    }
}

/// Collects every input into a `Vec`, preserving arrival order within a pane.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToList;

impl<T: StreamData> CombineFn<T, Vec<T>, Vec<T>> for ToList {
    fn create_accumulator(&self) -> Vec<T> {
        Vec::new()
    }

    fn add_input(&self, mut acc: Vec<T>, input: &T) -> Vec<T> {
        acc.push(input.clone());
        acc
    }

    fn merge_accumulators(&self, accs: Vec<Vec<T>>) -> Vec<T> {
        accs.into_iter().flatten().collect()
    }

    fn extract_output(&self, acc: &Vec<T>) -> Vec<T> {
        acc.clone()
    }
}

#[cfg(test)]
#[path = "tests/combine_tests.rs"]
mod tests;

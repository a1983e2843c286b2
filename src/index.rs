/*
 * Copyright 2019-2020 Wren Powell
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use crate::error::Error;
use crate::Result;

/// A single axis of an [`Index`].
///
/// Modeled as a tagged sum rather than a runtime-checked union, per the
/// three selector shapes a caller can provide for one axis.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// A single element; resolving it drops the axis.
    Integer(i64),
    /// A half-open range `start..stop` stepped by `step`. `stop ==
    /// i64::MAX` means "to the end"; negative `start`/`stop` count from
    /// the end, Python-slice style.
    Slice { start: i64, stop: i64, step: i64 },
    /// An explicit, ordered list of elements; the axis is kept with that
    /// length.
    List(Vec<i64>),
}

impl Selector {
    /// The selector that keeps an axis unchanged.
    pub fn full() -> Self {
        Selector::Slice {
            start: 0,
            stop: i64::MAX,
            step: 1,
        }
    }
}

/// A lazily-composed, multi-axis index expression.
///
/// An `Index` is an ordered list of per-axis [`Selector`]s. Composing a new
/// selector list into an existing `Index` never reads data; axis 0 always
/// denotes the tensor's sample ordinal, axes 1.. denote dimensions within
/// each sample's shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Index {
    axes: Vec<Selector>,
}

impl Index {
    /// The trivial index: selects everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this index selects everything (no axes constrained).
    pub fn is_trivial(&self) -> bool {
        self.axes.is_empty()
    }

    pub fn axes(&self) -> &[Selector] {
        &self.axes
    }

    /// The selector for axis 0 (the sample ordinal), defaulting to "every
    /// sample" if unconstrained.
    pub fn sample_selector(&self) -> Selector {
        self.axes.first().cloned().unwrap_or_else(Selector::full)
    }

    /// The selectors for axes 1.. (within each sample's shape).
    pub fn inner_selectors(&self) -> &[Selector] {
        if self.axes.is_empty() {
            &[]
        } else {
            &self.axes[1..]
        }
    }

    /// Compose `sub` into this index: the first axis whose selector is not
    /// already a resolved `Integer` absorbs `sub[0]`, refining it; any
    /// remaining entries in `sub` are appended as new axes.
    ///
    /// Per the lazy-composition contract (no data is read), refining an
    /// axis that was already constrained by something other than the
    /// trivial full-slice simply replaces it; only the common case of
    /// refining a still-trivial axis is a true nested composition.
    pub fn compose(&self, sub: Vec<Selector>) -> Index {
        let mut axes = self.axes.clone();
        let pos = axes.iter().position(|s| !matches!(s, Selector::Integer(_)));

        let mut sub_iter = sub.into_iter();
        match pos {
            Some(p) => {
                if let Some(first) = sub_iter.next() {
                    axes[p] = first;
                }
                axes.extend(sub_iter);
            }
            None => axes.extend(sub_iter),
        }

        Index { axes }
    }
}

enum ResolvedAxis {
    Dropped(usize),
    Kept(Vec<usize>),
}

fn normalize_index(i: i64, dim: usize) -> Result<usize> {
    let idx = if i < 0 { dim as i64 + i } else { i };
    if idx < 0 || idx as usize >= dim {
        return Err(Error::OutOfRange {
            offset: i as u64,
            length: 1,
            actual_len: dim as u64,
        });
    }
    Ok(idx as usize)
}

fn resolve_slice(start: i64, stop: i64, step: i64, dim: usize) -> Vec<usize> {
    let step = step.max(1);
    let stop = if stop == i64::MAX {
        dim as i64
    } else if stop < 0 {
        dim as i64 + stop
    } else {
        stop
    }
    .clamp(0, dim as i64);
    let start = if start < 0 { dim as i64 + start } else { start }.clamp(0, dim as i64);

    let mut indices = Vec::new();
    let mut i = start;
    while i < stop {
        indices.push(i as usize);
        i += step;
    }
    indices
}

/// Resolve `selector` against a concrete dimension size to the ordered
/// list of indices it selects, collapsing the `Integer` case to a
/// single-element list.
pub fn resolve_axis_indices(selector: &Selector, dim: usize) -> Result<Vec<usize>> {
    match resolve_axis(selector, dim)? {
        ResolvedAxis::Dropped(idx) => Ok(vec![idx]),
        ResolvedAxis::Kept(indices) => Ok(indices),
    }
}

fn resolve_axis(selector: &Selector, dim: usize) -> Result<ResolvedAxis> {
    match selector {
        Selector::Integer(i) => Ok(ResolvedAxis::Dropped(normalize_index(*i, dim)?)),
        Selector::Slice { start, stop, step } => Ok(ResolvedAxis::Kept(resolve_slice(*start, *stop, *step, dim))),
        Selector::List(items) => {
            let indices = items
                .iter()
                .map(|&i| normalize_index(i, dim))
                .collect::<Result<Vec<_>>>()?;
            Ok(ResolvedAxis::Kept(indices))
        }
    }
}

fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    axis: usize,
    resolved: &[ResolvedAxis],
    current: &mut Vec<usize>,
    strides: &[usize],
    buf: &[u8],
    itemsize: usize,
    out: &mut Vec<u8>,
) {
    if axis == resolved.len() {
        let offset: usize = current.iter().zip(strides).map(|(&i, &s)| i * s).sum();
        let byte_offset = offset * itemsize;
        out.extend_from_slice(&buf[byte_offset..byte_offset + itemsize]);
        return;
    }
    match &resolved[axis] {
        ResolvedAxis::Dropped(idx) => {
            current.push(*idx);
            recurse(axis + 1, resolved, current, strides, buf, itemsize, out);
            current.pop();
        }
        ResolvedAxis::Kept(indices) => {
            for &idx in indices {
                current.push(idx);
                recurse(axis + 1, resolved, current, strides, buf, itemsize, out);
                current.pop();
            }
        }
    }
}

/// Apply `selectors` (one per axis of `shape`, padded with `Selector::full`
/// for any trailing axes) to a row-major, `itemsize`-byte-per-element flat
/// buffer, returning the sliced buffer and its resulting shape.
///
/// This is the one piece of element-level array manipulation this crate
/// performs directly; full numeric-array semantics (dtype casting,
/// broadcasting, strides beyond row-major) are the concern of whatever
/// array runtime consumes the result.
pub fn slice_flat(buf: &[u8], shape: &[usize], itemsize: usize, selectors: &[Selector]) -> Result<(Vec<u8>, Vec<usize>)> {
    let mut resolved = Vec::with_capacity(shape.len());
    for (axis, &dim) in shape.iter().enumerate() {
        let selector = selectors.get(axis).cloned().unwrap_or_else(Selector::full);
        resolved.push(resolve_axis(&selector, dim)?);
    }

    let out_shape: Vec<usize> = resolved
        .iter()
        .filter_map(|r| match r {
            ResolvedAxis::Kept(indices) => Some(indices.len()),
            ResolvedAxis::Dropped(_) => None,
        })
        .collect();

    let strides = row_major_strides(shape);
    let mut out = Vec::new();
    let mut current = Vec::with_capacity(shape.len());
    recurse(0, &resolved, &mut current, &strides, buf, itemsize, &mut out);

    Ok((out, out_shape))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_index_is_empty() {
        assert!(Index::new().is_trivial());
    }

    #[test]
    fn compose_refines_trivial_first_axis() {
        let index = Index::new();
        let composed = index.compose(vec![Selector::Integer(3)]);
        assert_eq!(composed.axes(), &[Selector::Integer(3)]);
    }

    #[test]
    fn compose_appends_beyond_first_axis() {
        let index = Index::new();
        let composed = index.compose(vec![
            Selector::Slice {
                start: 30,
                stop: 40,
                step: 1,
            },
            Selector::full(),
            Selector::Slice {
                start: 8,
                stop: 11,
                step: 1,
            },
            Selector::Integer(4),
        ]);
        assert_eq!(composed.axes().len(), 4);
    }

    #[test]
    fn slice_flat_drops_integer_axes() {
        // shape (2, 3), itemsize 1, values 0..6 row-major.
        let buf: Vec<u8> = (0..6).collect();
        let (out, shape) = slice_flat(&buf, &[2, 3], 1, &[Selector::Integer(1)]).unwrap();
        assert_eq!(out, vec![3, 4, 5]);
        assert_eq!(shape, vec![3]);
    }

    #[test]
    fn slice_flat_keeps_slice_axes() {
        let buf: Vec<u8> = (0..6).collect();
        let (out, shape) = slice_flat(
            &buf,
            &[2, 3],
            1,
            &[
                Selector::full(),
                Selector::Slice {
                    start: 1,
                    stop: 3,
                    step: 1,
                },
            ],
        )
        .unwrap();
        assert_eq!(out, vec![1, 2, 4, 5]);
        assert_eq!(shape, vec![2, 2]);
    }

    #[test]
    fn slice_flat_with_list_selector() {
        let buf: Vec<u8> = (0..6).collect();
        let (out, shape) = slice_flat(&buf, &[6], 1, &[Selector::List(vec![0, 2, 5])]).unwrap();
        assert_eq!(out, vec![0, 2, 5]);
        assert_eq!(shape, vec![3]);
    }

    #[test]
    fn negative_index_counts_from_end() {
        let buf: Vec<u8> = (0..6).collect();
        let (out, shape) = slice_flat(&buf, &[6], 1, &[Selector::Integer(-1)]).unwrap();
        assert_eq!(out, vec![5]);
        assert_eq!(shape, Vec::<usize>::new());
    }
}

//! List diffing for `SubmitList`.
//!
//! Finds the longest run of items that keep their identity with Myers'
//! O(ND) algorithm (linear-space, middle-snake divide and conquer), pairs
//! leftover removals and insertions of the same item as moves, and compares
//! the content of every surviving item. The result is an ordered list of
//! [`ListChange`]s that turns the old list into the new one.

use std::ops::{Index, IndexMut, Range};
use std::sync::atomic::{AtomicBool, Ordering};

use pagekit_types::{ChangePayload, ListChange};
use thiserror::Error;

/// Item comparison used by [`diff`].
///
/// Implementations run on a worker thread. A panic inside a callback
/// aborts the diff and is reported to whoever awaits the update.
pub trait ItemCallback<T>: Send + Sync {
    /// Whether two items represent the same entity.
    fn are_items_same(&self, old: &T, new: &T) -> bool;

    /// Whether two items of the same entity look the same.
    fn are_contents_same(&self, old: &T, new: &T) -> bool;

    /// Partial-update payload for an item whose content changed.
    fn change_payload(&self, _old: &T, _new: &T) -> Option<ChangePayload> {
        None
    }

    /// Pair removals and insertions of the same item into moves.
    fn detect_moves(&self) -> bool {
        true
    }
}

/// Identity and content are both `PartialEq`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqCallback;

impl<T: PartialEq> ItemCallback<T> for EqCallback {
    fn are_items_same(&self, old: &T, new: &T) -> bool {
        old == new
    }

    fn are_contents_same(&self, old: &T, new: &T) -> bool {
        old == new
    }
}

/// Identity by key, content by `PartialEq`.
#[derive(Debug, Clone, Copy)]
pub struct KeyedCallback<F> {
    key: F,
}

impl<F> KeyedCallback<F> {
    /// Use `key` to decide item identity.
    pub fn new(key: F) -> Self {
        Self { key }
    }
}

impl<T, K, F> ItemCallback<T> for KeyedCallback<F>
where
    T: PartialEq,
    K: PartialEq,
    F: Fn(&T) -> K + Send + Sync,
{
    fn are_items_same(&self, old: &T, new: &T) -> bool {
        (self.key)(old) == (self.key)(new)
    }

    fn are_contents_same(&self, old: &T, new: &T) -> bool {
        old == new
    }
}

/// The diff was cancelled before it finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("diff cancelled")]
pub struct DiffCancelled;

/// Compute the changes that turn `old` into `new`.
///
/// `cancel` is polled once per edit-distance round; once it is set the
/// diff stops with [`DiffCancelled`].
pub fn diff<T>(
    old: &[T],
    new: &[T],
    callback: &dyn ItemCallback<T>,
    cancel: &AtomicBool,
) -> Result<Vec<ListChange>, DiffCancelled> {
    let mut matcher = Matcher {
        old,
        new,
        callback,
        cancel,
        pairs: Vec::new(),
    };
    let max_d = max_d(old.len(), new.len());
    let mut vf = V::new(max_d);
    let mut vb = V::new(max_d);
    matcher.conquer(0..old.len(), 0..new.len(), &mut vf, &mut vb)?;

    // Source position in `old` of every item of `new`
    let mut sources: Vec<Option<usize>> = vec![None; new.len()];
    let mut kept = vec![false; old.len()];
    for &(o, n) in &matcher.pairs {
        sources[n] = Some(o);
        kept[o] = true;
    }

    let mut moved = vec![false; old.len()];
    if callback.detect_moves() {
        pair_moves(old, new, callback, &mut sources, &mut kept, &mut moved, cancel)?;
    }

    Ok(emit(old, new, callback, &sources, &kept, &moved))
}

/// Replay `changes` against `old`, filling inserted and changed slots
/// from `new`.
///
/// Returns `None` if a change addresses a position outside the list or the
/// result does not have the length of `new`.
pub fn replay<T: Clone>(old: &[T], new: &[T], changes: &[ListChange]) -> Option<Vec<T>> {
    let mut work: Vec<Option<T>> = old.iter().cloned().map(Some).collect();
    for change in changes {
        match change {
            ListChange::Inserted { position, count } => {
                if *position > work.len() {
                    return None;
                }
                work.splice(*position..*position, std::iter::repeat_with(|| None).take(*count));
            }
            ListChange::Removed { position, count } => {
                let end = checked_end(*position, *count, work.len())?;
                work.drain(*position..end);
            }
            ListChange::Moved { from, to } => {
                if *from >= work.len() || *to >= work.len() {
                    return None;
                }
                let item = work.remove(*from);
                work.insert(*to, item);
            }
            ListChange::Changed {
                position, count, ..
            } => {
                let end = checked_end(*position, *count, work.len())?;
                for slot in &mut work[*position..end] {
                    *slot = None;
                }
            }
        }
    }
    if work.len() != new.len() {
        return None;
    }
    Some(
        work.into_iter()
            .zip(new)
            .map(|(slot, item)| slot.unwrap_or_else(|| item.clone()))
            .collect(),
    )
}

fn checked_end(position: usize, count: usize, len: usize) -> Option<usize> {
    position.checked_add(count).filter(|end| *end <= len)
}

// =============================================================================
// Matching
// =============================================================================

struct Matcher<'a, T> {
    old: &'a [T],
    new: &'a [T],
    callback: &'a dyn ItemCallback<T>,
    cancel: &'a AtomicBool,
    /// Matched `(old, new)` index pairs, increasing in both.
    pairs: Vec<(usize, usize)>,
}

impl<T> Matcher<'_, T> {
    fn same(&self, o: usize, n: usize) -> bool {
        self.callback.are_items_same(&self.old[o], &self.new[n])
    }

    fn common_prefix_len(&self, old: Range<usize>, new: Range<usize>) -> usize {
        old.zip(new).take_while(|&(o, n)| self.same(o, n)).count()
    }

    fn common_suffix_len(&self, old: Range<usize>, new: Range<usize>) -> usize {
        old.rev()
            .zip(new.rev())
            .take_while(|&(o, n)| self.same(o, n))
            .count()
    }

    fn conquer(
        &mut self,
        mut old: Range<usize>,
        mut new: Range<usize>,
        vf: &mut V,
        vb: &mut V,
    ) -> Result<(), DiffCancelled> {
        let prefix = self.common_prefix_len(old.clone(), new.clone());
        for i in 0..prefix {
            self.pairs.push((old.start + i, new.start + i));
        }
        old.start += prefix;
        new.start += prefix;

        let suffix = self.common_suffix_len(old.clone(), new.clone());
        old.end -= suffix;
        new.end -= suffix;

        if !old.is_empty() && !new.is_empty() {
            if let Some((x, y)) = self.find_middle_snake(old.clone(), new.clone(), vf, vb)? {
                self.conquer(old.start..x, new.start..y, vf, vb)?;
                self.conquer(x..old.end, y..new.end, vf, vb)?;
            }
        }

        for i in 0..suffix {
            self.pairs.push((old.end + i, new.end + i));
        }
        Ok(())
    }

    fn find_middle_snake(
        &self,
        old: Range<usize>,
        new: Range<usize>,
        vf: &mut V,
        vb: &mut V,
    ) -> Result<Option<(usize, usize)>, DiffCancelled> {
        let n = old.len();
        let m = new.len();
        let delta = n as isize - m as isize;
        let odd = delta & 1 == 1;

        vf[1] = 0;
        vb[1] = 0;

        let d_max = max_d(n, m) as isize;
        for d in 0..d_max {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(DiffCancelled);
            }

            // Forward
            for k in (-d..=d).rev().step_by(2) {
                let mut x = if k == -d || (k != d && vf[k - 1] < vf[k + 1]) {
                    vf[k + 1]
                } else {
                    vf[k - 1] + 1
                };
                let y = (x as isize - k) as usize;
                let (x0, y0) = (x, y);
                if x < n && y < m {
                    x += self.common_prefix_len(old.start + x..old.end, new.start + y..new.end);
                }
                vf[k] = x;
                if odd && (k - delta).abs() <= d - 1 && vf[k] + vb[-(k - delta)] >= n {
                    return Ok(Some((old.start + x0, new.start + y0)));
                }
            }

            // Backward
            for k in (-d..=d).rev().step_by(2) {
                let mut x = if k == -d || (k != d && vb[k - 1] < vb[k + 1]) {
                    vb[k + 1]
                } else {
                    vb[k - 1] + 1
                };
                let mut y = (x as isize - k) as usize;
                if x < n && y < m {
                    let advance = self.common_suffix_len(
                        old.start..old.start + n - x,
                        new.start..new.start + m - y,
                    );
                    x += advance;
                    y += advance;
                }
                vb[k] = x;
                if !odd && (k - delta).abs() <= d && vb[k] + vf[-(k - delta)] >= n {
                    return Ok(Some((old.start + n - x, new.start + m - y)));
                }
            }
        }
        Ok(None)
    }
}

fn max_d(len1: usize, len2: usize) -> usize {
    (len1 + len2 + 1) / 2 + 1
}

/// Furthest-reaching x per diagonal, indexed by signed diagonal.
struct V {
    offset: isize,
    v: Vec<usize>,
}

impl V {
    fn new(max_d: usize) -> Self {
        Self {
            offset: max_d as isize,
            v: vec![0; 2 * max_d + 1],
        }
    }
}

impl Index<isize> for V {
    type Output = usize;

    fn index(&self, index: isize) -> &usize {
        &self.v[(index + self.offset) as usize]
    }
}

impl IndexMut<isize> for V {
    fn index_mut(&mut self, index: isize) -> &mut usize {
        &mut self.v[(index + self.offset) as usize]
    }
}

// =============================================================================
// Moves and emission
// =============================================================================

/// Pair every unmatched new item with the first unmatched old item of the
/// same identity.
fn pair_moves<T>(
    old: &[T],
    new: &[T],
    callback: &dyn ItemCallback<T>,
    sources: &mut [Option<usize>],
    kept: &mut [bool],
    moved: &mut [bool],
    cancel: &AtomicBool,
) -> Result<(), DiffCancelled> {
    let mut removed: Vec<usize> = (0..old.len()).filter(|&o| !kept[o]).collect();
    if removed.is_empty() {
        return Ok(());
    }
    for (n, source) in sources.iter_mut().enumerate() {
        if source.is_some() {
            continue;
        }
        if cancel.load(Ordering::Relaxed) {
            return Err(DiffCancelled);
        }
        if let Some(slot) = removed
            .iter()
            .position(|&o| callback.are_items_same(&old[o], &new[n]))
        {
            let o = removed.remove(slot);
            *source = Some(o);
            kept[o] = true;
            moved[o] = true;
            if removed.is_empty() {
                break;
            }
        }
    }
    Ok(())
}

/// Turn the old-to-new mapping into ordered changes.
///
/// Removals go first, back to front. Then new positions are walked front to
/// back: inserted runs, moves into place, and content changes. Matched
/// items never move; a moved item sitting in front of one is sent to the
/// end until its own destination comes up.
fn emit<T>(
    old: &[T],
    new: &[T],
    callback: &dyn ItemCallback<T>,
    sources: &[Option<usize>],
    kept: &[bool],
    moved: &[bool],
) -> Vec<ListChange> {
    let mut changes = Vec::new();

    let mut end = old.len();
    while end > 0 {
        if kept[end - 1] {
            end -= 1;
            continue;
        }
        let mut start = end - 1;
        while start > 0 && !kept[start - 1] {
            start -= 1;
        }
        changes.push(ListChange::Removed {
            position: start,
            count: end - start,
        });
        end = start;
    }

    let mut work: Vec<Option<usize>> = (0..old.len()).filter(|&o| kept[o]).map(Some).collect();
    let mut j = 0;
    while j < new.len() {
        let Some(o) = sources[j] else {
            let count = sources[j..].iter().take_while(|s| s.is_none()).count();
            changes.push(ListChange::Inserted { position: j, count });
            work.splice(j..j, std::iter::repeat(None).take(count));
            j += count;
            continue;
        };

        let offset = work[j..].iter().position(|&w| w == Some(o)).unwrap_or(0);
        if offset > 0 {
            if moved[o] {
                let from = j + offset;
                let item = work.remove(from);
                work.insert(j, item);
                changes.push(ListChange::Moved { from, to: j });
            } else {
                let last = work.len() - 1;
                for _ in 0..offset {
                    let item = work.remove(j);
                    work.push(item);
                    changes.push(ListChange::Moved { from: j, to: last });
                }
            }
        }

        if !callback.are_contents_same(&old[o], &new[j]) {
            push_changed(&mut changes, j, callback.change_payload(&old[o], &new[j]));
        }
        j += 1;
    }
    changes
}

/// Record a content change, extending the previous one when adjacent.
fn push_changed(changes: &mut Vec<ListChange>, position: usize, payload: Option<ChangePayload>) {
    if payload.is_none() {
        if let Some(ListChange::Changed {
            position: start,
            count,
            payload: None,
        }) = changes.last_mut()
        {
            if *start + *count == position {
                *count += 1;
                return;
            }
        }
    }
    changes.push(ListChange::Changed {
        position,
        count: 1,
        payload,
    });
}

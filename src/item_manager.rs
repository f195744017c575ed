//! The capability trait that parameterizes [`crate::sparse_items::SparseItems`] and
//! [`crate::item_list::ItemList`] over what kind of content a bunch stores.
//!
//! One manager type per content kind, dispatched at compile time via the type parameter rather
//! than a runtime enum — the same shape the teacher uses to dispatch op payload kinds
//! (`InternalOpKind`-style) through a trait implemented once per kind instead of a giant match.

use std::ops::Range;

/// A content kind a bunch's [`crate::sparse_items::SparseItems`] can hold.
///
/// `Run` is the type of a maximal contiguous present run (e.g. `Vec<T>` for a list of `T`,
/// `Vec<u16>` for text, a bare count for an outline). `Item` is a single element of that run.
pub trait ItemManager {
    type Item;
    type Run: Clone + std::fmt::Debug;

    fn empty() -> Self::Run;
    fn len(run: &Self::Run) -> usize;
    fn get(run: &Self::Run, index: usize) -> Self::Item;
    fn slice(run: &Self::Run, range: Range<usize>) -> Self::Run;
    /// Split `run` into `[0, at)` and `[at, len)`. `0 < at < len(run)`.
    fn split(run: Self::Run, at: usize) -> (Self::Run, Self::Run);
    fn append(a: &mut Self::Run, b: Self::Run);
}

/// Content manager for [`crate::list::List`]: runs are `Vec<T>`.
pub struct VecManager<T>(std::marker::PhantomData<T>);

impl<T: Clone + std::fmt::Debug> ItemManager for VecManager<T> {
    type Item = T;
    type Run = Vec<T>;

    fn empty() -> Vec<T> {
        Vec::new()
    }

    fn len(run: &Vec<T>) -> usize {
        run.len()
    }

    fn get(run: &Vec<T>, index: usize) -> T {
        run[index].clone()
    }

    fn slice(run: &Vec<T>, range: Range<usize>) -> Vec<T> {
        run[range].to_vec()
    }

    fn split(mut run: Vec<T>, at: usize) -> (Vec<T>, Vec<T>) {
        let rest = run.split_off(at);
        (run, rest)
    }

    fn append(a: &mut Vec<T>, b: Vec<T>) {
        a.extend(b);
    }
}

/// Content manager for [`crate::text::Text`]: runs are raw UTF-16 code units (`Vec<u16>`),
/// matching the external-interfaces convention used for `AbsPosition`/saved-state indices and
/// the usual JS-string-compatible indexing for collaborative text.
///
/// A caller-chosen split index is a valid index anywhere in `[0, len]` per that indexing
/// contract, including between the two code units of an astral-plane character's surrogate
/// pair (e.g. deleting one code unit out of an emoji, or an `items()` clip boundary landing
/// mid-pair). Storing runs as `String` would force every such split through
/// `String::from_utf16_lossy`, which silently bakes a `char::REPLACEMENT_CHARACTER` over the
/// orphaned surrogate into the stored content. Keeping runs as `Vec<u16>` instead makes
/// splitting and slicing plain index arithmetic — lossless regardless of where the cut falls —
/// and defers UTF-16 decoding to the one place a caller actually wants a `str::String`
/// (`Text::to_string`/`Text::items`), where a lossy decode of a deliberately-split fragment is
/// an expected, non-persistent degradation rather than silent storage corruption.
pub struct StringManager;

impl ItemManager for StringManager {
    type Item = char;
    type Run = Vec<u16>;

    fn empty() -> Vec<u16> {
        Vec::new()
    }

    fn len(run: &Vec<u16>) -> usize {
        run.len()
    }

    fn get(run: &Vec<u16>, index: usize) -> char {
        char::decode_utf16(run[index..].iter().copied())
            .next()
            .expect("index within bounds")
            .unwrap_or(char::REPLACEMENT_CHARACTER)
    }

    fn slice(run: &Vec<u16>, range: Range<usize>) -> Vec<u16> {
        run[range].to_vec()
    }

    fn split(mut run: Vec<u16>, at: usize) -> (Vec<u16>, Vec<u16>) {
        let rest = run.split_off(at);
        (run, rest)
    }

    fn append(a: &mut Vec<u16>, b: Vec<u16>) {
        a.extend(b);
    }
}

/// Content manager for [`crate::outline::Outline`] and [`crate::position_set::PositionSet`]:
/// runs carry no payload, only a present count.
pub struct CountManager;

impl ItemManager for CountManager {
    type Item = ();
    type Run = u32;

    fn empty() -> u32 {
        0
    }

    fn len(run: &u32) -> usize {
        *run as usize
    }

    fn get(_run: &u32, _index: usize) {}

    fn slice(_run: &u32, range: Range<usize>) -> u32 {
        (range.end - range.start) as u32
    }

    fn split(run: u32, at: usize) -> (u32, u32) {
        (at as u32, run - at as u32)
    }

    fn append(a: &mut u32, b: u32) {
        *a += b;
    }
}

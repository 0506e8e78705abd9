//! State derived from the block chain.

use crate::StoreError;

/// A table whose contents are a function of the applied blocks.
///
/// The engine drives every derived table through the same lifecycle:
/// `begin`/`commit`/`abort` bracket one atomic unit (a block push, a pop-off,
/// a rescan step); `rollback(h)` forgets everything newer than height `h`;
/// `truncate` empties the table before a rescan from genesis; `trim(h)`
/// drops history that can no longer be rolled back to.
pub trait DerivedTable {
    fn name(&self) -> &'static str;

    fn begin(&mut self);

    fn commit(&mut self);

    /// Undo every change since `begin`.
    fn abort(&mut self);

    fn rollback(&mut self, height: u32) -> Result<(), StoreError>;

    fn truncate(&mut self) -> Result<(), StoreError>;

    fn trim(&mut self, height: u32) -> Result<(), StoreError>;
}

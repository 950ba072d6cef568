//! Row lock modes.

/// Lock requested alongside a read.
///
/// `WriteNoWait` fails fast with a lock conflict when the row is already
/// held by another transaction; it never blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockMode {
    #[default]
    None,
    Read,
    WriteNoWait,
}

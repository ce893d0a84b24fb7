//! Routine trait - binds a routine name to its argument and output types.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A named unit of work a code unit can refer to.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct TallyVotes {
///     proposal: String,
/// }
///
/// impl Routine for TallyVotes {
///     const NAME: &'static str = "governance.tally_votes.v1";
///     type Output = u64;
/// }
/// ```
///
/// The implementing type is the routine's argument payload, decoded from the
/// call's `args`.
pub trait Routine: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Naming: `{namespace}.{action}.v{major}`, e.g. `governance.tally_votes.v1`.
    const NAME: &'static str;

    type Output: Serialize + Send + 'static;
}

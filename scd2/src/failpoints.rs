use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, EtlError, EtlResult};

/// Between the close phase and the append phase of a merge.
pub const MERGE_AFTER_CLOSE: &str = "merge.after_close";
/// After the merge wrote its rows, before the snapshot reload.
pub const MERGE_BEFORE_SNAPSHOT: &str = "merge.before_snapshot";
/// Before the run transaction commits.
pub const RUN_BEFORE_COMMIT: &str = "run.before_commit";

/// Returns an error when the named failpoint is configured with `return`.
///
/// The optional parameter selects the error kind: `constraint` raises a destination constraint
/// violation, `destination` a destination query failure. Anything else raises
/// [`ErrorKind::FailpointTriggered`].
pub fn etl_fail_point(name: &str) -> EtlResult<()> {
    fail_point!(name, |parameter| {
        let error_kind = match parameter.as_deref() {
            Some("constraint") => ErrorKind::DestinationConstraintViolation,
            Some("destination") => ErrorKind::DestinationQueryFailed,
            _ => ErrorKind::FailpointTriggered,
        };

        bail!(
            error_kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}

pub mod archer;
pub mod club;
pub mod user;

pub use archer::{Archer, ArcherDraft, ArcherInput, ArcherPatch};
pub use club::{Club, ClubDraft, ClubInput, ClubPatch, ClubView, Membership, MembershipView};
pub use user::{NewUser, Session, User, UserView};

use chrono::{DateTime, Duration, SubsecRound, Utc};

/// Current time at the precision PostgreSQL stores (microseconds), so a
/// record reads back identical to what was written.
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Next `modified_at` for a record last modified at `previous`. Always
/// strictly later than `previous`, even when the clock has not advanced.
pub fn next_modified(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = timestamp_now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

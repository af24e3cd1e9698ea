//! News records: classification, publish policy, localization, identity and
//! final assembly.

mod assemble;
mod classify;
mod identity;
mod localize;
mod policy;
mod types;

pub use assemble::{assemble, build_record, cap_source, Assembly, Duplicate};
pub use classify::classify;
pub use identity::{record_id, ID_LEN};
pub use localize::{
    detect_language, detect_market, localize, normalize_displacement, LocalizeInput, Localized,
    TitleStrategy, DESCRIPTION_MAX, TITLE_MAX,
};
pub use policy::{decide, Decision};
pub use types::{ContentKind, NewsRecord, RecordStatus};

use super::event::EventUser;

/// djb2 over UTF-16 code units, rendered as an unsigned decimal string.
pub fn djb2(value: &str) -> String {
    let mut hash: i32 = 0;
    for unit in value.encode_utf16() {
        hash = (hash << 5).wrapping_sub(hash).wrapping_add(unit as i32);
    }
    (hash as u32).to_string()
}

/// Stable key identifying a user for a given SDK key.
///
/// Custom IDs are taken in key order so that the result does not depend on
/// insertion order.
pub fn user_storage_key(sdk_key: &str, user: Option<&EventUser>) -> String {
    let user_id = user.and_then(|u| u.user_id.as_deref()).unwrap_or_default();
    let custom_ids = user
        .map(|u| {
            u.custom_ids
                .iter()
                .map(|(k, v)| format!("{k}-{v}"))
                .collect::<Vec<_>>()
                .join(",")
        })
        .unwrap_or_default();

    djb2(&format!("uid:{user_id}|cids:{custom_ids}|k:{sdk_key}"))
}

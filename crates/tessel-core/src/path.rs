//! Dot/bracket paths for violation reports.
//!
//! The root value has the empty path. Record fields join with `.`
//! (`location.lat`), sequence and tuple positions append `[i]`
//! (`tags[2]`, `rows[0].id`).

/// Path of the field `key` inside the record at `parent`.
pub fn field(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        let mut out = String::with_capacity(parent.len() + 1 + key.len());
        out.push_str(parent);
        out.push('.');
        out.push_str(key);
        out
    }
}

/// Path of position `index` inside the sequence or tuple at `parent`.
pub fn index(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

//! Field Mapper: column names <-> field names.
//!
//! Columns are lower-case words joined by `_` (`user_name`); fields are the
//! same words capitalized and concatenated (`UserName`). A word that starts
//! with a digit has no capital to carry the boundary, so it keeps its `_`
//! in the field form (`a_1b` <-> `A_1b`).
//!
//! The two functions are exact inverses for names made of non-empty ASCII
//! alphanumeric words. Anything else is best effort.

/// Convert a column name to its field name.
///
/// ```
/// use relmap_core::column_to_field;
/// assert_eq!(column_to_field("user_name"), "UserName");
/// assert_eq!(column_to_field("id"), "Id");
/// ```
pub fn column_to_field(column: &str) -> String {
    let mut out = String::with_capacity(column.len());
    for (i, word) in column.split('_').enumerate() {
        let mut chars = word.chars();
        let Some(first) = chars.next() else {
            continue;
        };
        if first.is_ascii_digit() && i > 0 {
            out.push('_');
        }
        out.push(first.to_ascii_uppercase());
        out.extend(chars.map(|c| c.to_ascii_lowercase()));
    }
    out
}

/// Convert a field (or type) name to its column name.
///
/// ```
/// use relmap_core::field_to_column;
/// assert_eq!(field_to_column("UserInfo"), "user_info");
/// assert_eq!(field_to_column("A_1b"), "a_1b");
/// ```
pub fn field_to_column(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    let mut prev_underscore = false;
    for (i, c) in field.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 && !prev_underscore {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
        prev_underscore = c == '_';
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_to_field() {
        assert_eq!(column_to_field("id"), "Id");
        assert_eq!(column_to_field("user_id"), "UserId");
        assert_eq!(column_to_field("created_at_utc"), "CreatedAtUtc");
        assert_eq!(column_to_field("a_1b"), "A_1b");
        assert_eq!(column_to_field("x2_y"), "X2Y");
    }

    #[test]
    fn test_field_to_column() {
        assert_eq!(field_to_column("Id"), "id");
        assert_eq!(field_to_column("UserInfo"), "user_info");
        assert_eq!(field_to_column("CreatedAtUtc"), "created_at_utc");
        assert_eq!(field_to_column("X2Y"), "x2_y");
    }

    #[test]
    fn test_columns_survive_round_trip() {
        for column in [
            "id",
            "user_id",
            "parent_key_column",
            "a_1b",
            "v2",
            "col_2_3",
            "abc_def_ghi_j",
        ] {
            assert_eq!(field_to_column(&column_to_field(column)), column, "{column}");
        }
    }

    #[test]
    fn test_mixed_case_is_normalized() {
        assert_eq!(column_to_field("USER_ID"), "UserId");
    }
}

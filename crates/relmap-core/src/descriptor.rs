//! Record type descriptors.
//!
//! `#[derive(Model)]` emits static [`FieldInfo`] and [`RelationDecl`] tables.
//! [`Descriptor::of`] validates them and resolves each relation into the
//! key columns the resolver needs. Nothing is cached: every call builds a
//! fresh descriptor from the static tables.

use crate::error::{Error, Result};
use crate::model::Model;
use crate::naming::column_to_field;

/// Metadata about one declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    /// Rust identifier of the field
    pub ident: &'static str,
    /// Field name as the Field Mapper sees it (`UserId`)
    pub name: &'static str,
    /// Backing column (`user_id`)
    pub column: &'static str,
    pub primary_key: bool,
    pub auto_increment: bool,
    /// Excluded from reads, writes and relation checks
    pub ignored: bool,
    /// Populated by the relation resolver, never persisted
    pub relation: bool,
}

impl FieldInfo {
    /// A plain persisted field.
    pub const fn new(ident: &'static str, name: &'static str, column: &'static str) -> Self {
        Self {
            ident,
            name,
            column,
            primary_key: false,
            auto_increment: false,
            ignored: false,
            relation: false,
        }
    }

    pub const fn primary_key(mut self, value: bool) -> Self {
        self.primary_key = value;
        self
    }

    pub const fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = value;
        self
    }

    pub const fn ignored(mut self, value: bool) -> Self {
        self.ignored = value;
        self
    }

    pub const fn relation(mut self, value: bool) -> Self {
        self.relation = value;
        self
    }

    /// Read from and written to the database.
    pub const fn is_persisted(&self) -> bool {
        !self.ignored && !self.relation
    }

    /// Appears in INSERT column lists.
    pub const fn is_insertable(&self) -> bool {
        self.is_persisted() && !(self.primary_key && self.auto_increment)
    }
}

/// Static shape of a relation field's Rust type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// Neither `Option<_>` nor `Vec<_>`
    Scalar,
    /// `Option<T>`, `Option<Box<T>>`, `Option<Arc<T>>`
    Single,
    /// `Vec<T>`, `Vec<Box<T>>`, `Vec<Arc<T>>`
    Collection,
}

/// A relation as declared on the field, before validation.
#[derive(Debug, Clone, Copy)]
pub struct RelationDecl {
    /// Owning field name (Field Mapper form)
    pub field: &'static str,
    /// `has_one`, `has_many` or `belongs_to`
    pub kind: &'static str,
    /// Target table; empty when the attribute omitted it
    pub table: &'static str,
    pub shape: FieldShape,
    pub target_type: &'static str,
    /// Field table of the target type
    pub target_fields: fn() -> &'static [FieldInfo],
}

/// Relation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    HasOne,
    HasMany,
    BelongsTo,
}

impl RelationKind {
    /// Parse the attribute spelling.
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "has_one" => Some(RelationKind::HasOne),
            "has_many" => Some(RelationKind::HasMany),
            "belongs_to" => Some(RelationKind::BelongsTo),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            RelationKind::HasOne => "has_one",
            RelationKind::HasMany => "has_many",
            RelationKind::BelongsTo => "belongs_to",
        }
    }

    /// Shape the owning field must have.
    pub const fn expected_shape(&self) -> FieldShape {
        match self {
            RelationKind::HasOne | RelationKind::BelongsTo => FieldShape::Single,
            RelationKind::HasMany => FieldShape::Collection,
        }
    }
}

/// A validated relation with its key columns resolved.
///
/// Every kind loads the same way: take the value of `owner_key` on each
/// parent, query `table` where `target_column` matches, and attach each row
/// to the parents whose key equals the row's `target_column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub field: &'static str,
    pub kind: RelationKind,
    pub table: &'static str,
    pub target_type: &'static str,
    /// Owner field holding the key value
    pub owner_key: String,
    /// Column on the target table matched against the key
    pub target_column: &'static str,
}

/// Validated metadata for one record type.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub type_name: &'static str,
    pub table: &'static str,
    pub fields: &'static [FieldInfo],
    pub primary_key: Option<&'static FieldInfo>,
    pub auto_increment: bool,
    pub relations: Vec<Relation>,
}

impl Descriptor {
    /// Build and validate the descriptor of `M`.
    ///
    /// Fails with `Error::Config` on any malformed relation; nothing is
    /// skipped silently.
    #[allow(clippy::result_large_err)]
    pub fn of<M: Model>() -> Result<Self> {
        Self::build(M::TYPE_NAME, M::TABLE_NAME, M::fields(), M::relations())
    }

    #[allow(clippy::result_large_err)]
    fn build(
        type_name: &'static str,
        table: &'static str,
        fields: &'static [FieldInfo],
        decls: &'static [RelationDecl],
    ) -> Result<Self> {
        let primary_key = primary_key_of(fields);
        let mut relations = Vec::with_capacity(decls.len());

        for decl in decls {
            let kind = RelationKind::parse(decl.kind).ok_or_else(|| {
                Error::config(
                    type_name,
                    Some(decl.field),
                    format!("unsupported relation kind '{}'", decl.kind),
                )
            })?;
            if decl.table.is_empty() {
                return Err(Error::config(
                    type_name,
                    Some(decl.field),
                    "relation has no target table",
                ));
            }
            if decl.shape != kind.expected_shape() {
                let want = match kind.expected_shape() {
                    FieldShape::Collection => "a Vec of records",
                    _ => "an Option of a record",
                };
                return Err(Error::config(
                    type_name,
                    Some(decl.field),
                    format!("{} field must be {}", kind.as_str(), want),
                ));
            }

            let (owner_key, target_column) = match kind {
                RelationKind::HasOne | RelationKind::HasMany => {
                    let pk = primary_key.ok_or_else(|| {
                        Error::config(
                            type_name,
                            Some(decl.field),
                            format!("{} requires a primary key on {}", kind.as_str(), type_name),
                        )
                    })?;
                    (pk.name.to_string(), pk.column)
                }
                RelationKind::BelongsTo => {
                    let target_pk = primary_key_of((decl.target_fields)()).ok_or_else(|| {
                        Error::config(
                            type_name,
                            Some(decl.field),
                            format!("belongs_to target {} has no primary key", decl.target_type),
                        )
                    })?;
                    let fk = column_to_field(target_pk.column);
                    if !fields.iter().any(|f| f.is_persisted() && f.name == fk) {
                        return Err(Error::config(
                            type_name,
                            Some(decl.field),
                            format!("belongs_to needs a field named {} holding the foreign key", fk),
                        ));
                    }
                    (fk, target_pk.column)
                }
            };

            relations.push(Relation {
                field: decl.field,
                kind,
                table: decl.table,
                target_type: decl.target_type,
                owner_key,
                target_column,
            });
        }

        Ok(Self {
            type_name,
            table,
            fields,
            primary_key,
            auto_increment: primary_key.is_some_and(|pk| pk.auto_increment),
            relations,
        })
    }

    /// Look up a field by its Field Mapper name.
    pub fn field(&self, name: &str) -> Option<&'static FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields that are read from and written to the table.
    pub fn persisted_fields(&self) -> impl Iterator<Item = &'static FieldInfo> {
        self.fields.iter().filter(|f| f.is_persisted())
    }

    /// Fields that appear in INSERT column lists.
    pub fn insert_fields(&self) -> impl Iterator<Item = &'static FieldInfo> {
        self.fields.iter().filter(|f| f.is_insertable())
    }
}

fn primary_key_of(fields: &'static [FieldInfo]) -> Option<&'static FieldInfo> {
    fields.iter().find(|f| f.primary_key && !f.ignored)
}

#[cfg(test)]
mod tests {
    use super::*;

    static USER_FIELDS: &[FieldInfo] = &[
        FieldInfo::new("id", "Id", "id")
            .primary_key(true)
            .auto_increment(true),
        FieldInfo::new("name", "Name", "name"),
        FieldInfo::new("cache", "Cache", "cache").ignored(true),
        FieldInfo::new("posts", "Posts", "posts").relation(true),
    ];

    static GROUP_FIELDS: &[FieldInfo] = &[
        FieldInfo::new("group_id", "GroupId", "group_id").primary_key(true),
        FieldInfo::new("title", "Title", "title"),
    ];

    static MEMBER_FIELDS: &[FieldInfo] = &[
        FieldInfo::new("id", "Id", "id").primary_key(true),
        FieldInfo::new("group_id", "GroupId", "group_id"),
        FieldInfo::new("group", "Group", "group").relation(true),
    ];

    static NO_KEY_FIELDS: &[FieldInfo] = &[FieldInfo::new("title", "Title", "title")];

    fn group_fields() -> &'static [FieldInfo] {
        GROUP_FIELDS
    }

    fn no_key_fields() -> &'static [FieldInfo] {
        NO_KEY_FIELDS
    }

    fn decl(kind: &'static str, table: &'static str, shape: FieldShape) -> RelationDecl {
        RelationDecl {
            field: "Posts",
            kind,
            table,
            shape,
            target_type: "Group",
            target_fields: group_fields,
        }
    }

    fn leak(decls: Vec<RelationDecl>) -> &'static [RelationDecl] {
        Box::leak(decls.into_boxed_slice())
    }

    #[test]
    fn test_has_many_uses_owner_key() {
        let d = Descriptor::build(
            "User",
            "user",
            USER_FIELDS,
            leak(vec![decl("has_many", "post", FieldShape::Collection)]),
        )
        .unwrap();

        assert!(d.auto_increment);
        assert_eq!(d.primary_key.map(|f| f.column), Some("id"));
        assert_eq!(d.relations.len(), 1);
        let rel = &d.relations[0];
        assert_eq!(rel.kind, RelationKind::HasMany);
        assert_eq!(rel.owner_key, "Id");
        assert_eq!(rel.target_column, "id");

        let insert: Vec<_> = d.insert_fields().map(|f| f.column).collect();
        assert_eq!(insert, ["name"]);
        let persisted: Vec<_> = d.persisted_fields().map(|f| f.column).collect();
        assert_eq!(persisted, ["id", "name"]);
    }

    #[test]
    fn test_belongs_to_uses_target_key() {
        let decls = leak(vec![RelationDecl {
            field: "Group",
            kind: "belongs_to",
            table: "group",
            shape: FieldShape::Single,
            target_type: "Group",
            target_fields: group_fields,
        }]);
        let d = Descriptor::build("Member", "member", MEMBER_FIELDS, decls).unwrap();
        let rel = &d.relations[0];
        assert_eq!(rel.owner_key, "GroupId");
        assert_eq!(rel.target_column, "group_id");
    }

    #[test]
    fn test_missing_table_is_fatal() {
        let err = Descriptor::build(
            "User",
            "user",
            USER_FIELDS,
            leak(vec![decl("has_many", "", FieldShape::Collection)]),
        )
        .unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("no target table"));
    }

    #[test]
    fn test_unknown_kind_is_fatal() {
        let err = Descriptor::build(
            "User",
            "user",
            USER_FIELDS,
            leak(vec![decl("many_to_many", "post", FieldShape::Collection)]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unsupported relation kind 'many_to_many'"));
    }

    #[test]
    fn test_wrong_shape_is_fatal() {
        let err = Descriptor::build(
            "User",
            "user",
            USER_FIELDS,
            leak(vec![decl("has_one", "post", FieldShape::Collection)]),
        )
        .unwrap_err();
        assert!(err.is_config());

        let err = Descriptor::build(
            "User",
            "user",
            USER_FIELDS,
            leak(vec![decl("has_many", "post", FieldShape::Scalar)]),
        )
        .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_has_one_without_owner_key_is_fatal() {
        let err = Descriptor::build(
            "Tag",
            "tag",
            NO_KEY_FIELDS,
            leak(vec![decl("has_one", "post", FieldShape::Single)]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("requires a primary key"));
    }

    #[test]
    fn test_belongs_to_without_target_key_is_fatal() {
        let decls = leak(vec![RelationDecl {
            field: "Group",
            kind: "belongs_to",
            table: "group",
            shape: FieldShape::Single,
            target_type: "Tag",
            target_fields: no_key_fields,
        }]);
        let err = Descriptor::build("Member", "member", MEMBER_FIELDS, decls).unwrap_err();
        assert!(err.to_string().contains("has no primary key"));
    }

    #[test]
    fn test_belongs_to_without_foreign_key_field_is_fatal() {
        let decls = leak(vec![RelationDecl {
            field: "Group",
            kind: "belongs_to",
            table: "group",
            shape: FieldShape::Single,
            target_type: "Group",
            target_fields: group_fields,
        }]);
        let err = Descriptor::build("User", "user", USER_FIELDS, decls).unwrap_err();
        assert!(err.to_string().contains("GroupId"));
    }
}

//! Parsing and compile-time checks for `#[derive(Model)]`.

use proc_macro2::Span;
use syn::ext::IdentExt;
use syn::spanned::Spanned;
use syn::{
    Attribute, Data, DeriveInput, Error, Field, Fields, GenericArgument, Ident, Lit,
    PathArguments, Result, Type,
};

/// Parsed model definition.
pub struct ModelDef {
    pub name: Ident,
    pub table_name: String,
    pub fields: Vec<FieldDef>,
}

/// Parsed field definition.
pub struct FieldDef {
    pub ident: Ident,
    /// Field Mapper name (`UserId`)
    pub field_name: String,
    pub column: String,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub ignore: bool,
    pub relation: Option<RelationDef>,
}

impl FieldDef {
    pub fn is_persisted(&self) -> bool {
        !self.ignore && self.relation.is_none()
    }
}

/// A checked relation attribute.
pub struct RelationDef {
    pub kind: String,
    pub table: String,
    pub shape: Shape,
    /// Record type behind the `Option`/`Vec` and any `Box`/`Arc`
    pub target: Type,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Shape {
    Scalar,
    Single,
    Collection,
}

impl ModelDef {
    /// The auto-increment primary key, if any.
    pub fn auto_key(&self) -> Option<&FieldDef> {
        self.fields
            .iter()
            .find(|f| f.primary_key && f.auto_increment && !f.ignore)
    }
}

/// Parse a struct into a `ModelDef`.
pub fn parse_model(input: &DeriveInput) -> Result<ModelDef> {
    let name = input.ident.clone();

    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "Model cannot be derived for generic structs",
        ));
    }

    let table_name = parse_struct_attrs(&input.attrs)?
        .unwrap_or_else(|| field_to_column(&name.unraw().to_string()));

    let fields = match &input.data {
        Data::Struct(data) => parse_fields(&data.fields)?,
        Data::Enum(_) => {
            return Err(Error::new_spanned(
                input,
                "Model can only be derived for structs, not enums",
            ));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(
                input,
                "Model can only be derived for structs, not unions",
            ));
        }
    };

    Ok(ModelDef {
        name,
        table_name,
        fields,
    })
}

/// Parse struct-level `#[relmap(table = "...")]`.
fn parse_struct_attrs(attrs: &[Attribute]) -> Result<Option<String>> {
    let mut table = None;
    for attr in attrs {
        if !attr.path().is_ident("relmap") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                table = Some(string_value(&meta, "table name")?);
                Ok(())
            } else {
                Err(meta.error("unknown relmap struct attribute"))
            }
        })?;
    }
    Ok(table)
}

fn parse_fields(fields: &Fields) -> Result<Vec<FieldDef>> {
    match fields {
        Fields::Named(named) => named.named.iter().map(parse_field).collect(),
        Fields::Unnamed(_) => Err(Error::new(
            Span::call_site(),
            "Model requires a struct with named fields, not a tuple struct",
        )),
        Fields::Unit => Err(Error::new(
            Span::call_site(),
            "Model requires a struct with fields, not a unit struct",
        )),
    }
}

#[derive(Default)]
struct FieldAttrs {
    column: Option<String>,
    primary_key: bool,
    auto_increment: bool,
    ignore: bool,
    relation: Option<(String, Span)>,
    table: Option<String>,
}

fn parse_field(field: &Field) -> Result<FieldDef> {
    let ident = field
        .ident
        .clone()
        .ok_or_else(|| Error::new_spanned(field, "expected named field"))?;
    let attrs = parse_field_attrs(&field.attrs)?;
    let plain = ident.unraw().to_string();

    if attrs.auto_increment && !attrs.primary_key {
        return Err(Error::new_spanned(
            &ident,
            "auto_increment is only valid on the primary_key field",
        ));
    }
    if attrs.ignore && (attrs.primary_key || attrs.relation.is_some()) {
        return Err(Error::new_spanned(
            &ident,
            "ignored fields cannot be primary keys or relations",
        ));
    }

    let relation = match attrs.relation {
        Some((kind, span)) => Some(check_relation(
            &ident,
            &field.ty,
            kind,
            span,
            attrs.table,
        )?),
        None => {
            if attrs.table.is_some() {
                return Err(Error::new_spanned(
                    &ident,
                    "`table` on a field requires `relation = \"...\"`",
                ));
            }
            None
        }
    };

    if relation.is_some() && (attrs.primary_key || attrs.column.is_some()) {
        return Err(Error::new_spanned(
            &ident,
            "relation fields are not columns",
        ));
    }

    let column = attrs.column.unwrap_or_else(|| plain.clone());
    let field_name = if relation.is_some() {
        column_to_field(&plain)
    } else {
        column_to_field(&column)
    };

    Ok(FieldDef {
        ident,
        field_name,
        column,
        primary_key: attrs.primary_key,
        auto_increment: attrs.auto_increment,
        ignore: attrs.ignore,
        relation,
    })
}

fn parse_field_attrs(attrs: &[Attribute]) -> Result<FieldAttrs> {
    let mut result = FieldAttrs::default();

    for attr in attrs {
        if !attr.path().is_ident("relmap") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let path = &meta.path;

            if path.is_ident("primary_key") {
                result.primary_key = true;
            } else if path.is_ident("auto_increment") {
                result.auto_increment = true;
            } else if path.is_ident("ignore") {
                result.ignore = true;
            } else if path.is_ident("column") {
                result.column = Some(string_value(&meta, "column name")?);
            } else if path.is_ident("relation") {
                let span = path.span();
                result.relation = Some((string_value(&meta, "relation kind")?, span));
            } else if path.is_ident("table") {
                result.table = Some(string_value(&meta, "table name")?);
            } else {
                return Err(meta.error("unknown relmap field attribute"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

fn string_value(meta: &syn::meta::ParseNestedMeta<'_>, what: &str) -> Result<String> {
    let value: Lit = meta.value()?.parse()?;
    if let Lit::Str(lit_str) = value {
        Ok(lit_str.value())
    } else {
        Err(Error::new_spanned(
            value,
            format!("expected string literal for {}", what),
        ))
    }
}

fn check_relation(
    ident: &Ident,
    ty: &Type,
    kind: String,
    span: Span,
    table: Option<String>,
) -> Result<RelationDef> {
    let expected = match kind.as_str() {
        "has_one" | "belongs_to" => Shape::Single,
        "has_many" => Shape::Collection,
        other => {
            return Err(Error::new(
                span,
                format!(
                    "unsupported relation kind '{}'; expected has_one, has_many or belongs_to",
                    other
                ),
            ));
        }
    };

    let table = match table {
        Some(t) if !t.is_empty() => t,
        _ => {
            return Err(Error::new_spanned(
                ident,
                "relation requires a target table: add `table = \"...\"`",
            ));
        }
    };

    let (shape, target) = relation_shape(ty);
    if shape != expected {
        let want = if expected == Shape::Collection {
            "Vec<T>"
        } else {
            "Option<T>"
        };
        return Err(Error::new_spanned(
            ty,
            format!("{} relation field must be {}", kind, want),
        ));
    }

    let target = target.ok_or_else(|| Error::new_spanned(ty, "cannot find the related type"))?;

    Ok(RelationDef {
        kind,
        table,
        shape,
        target,
    })
}

/// Classify a relation field's type and pull out the record type.
pub fn relation_shape(ty: &Type) -> (Shape, Option<Type>) {
    match single_generic(ty, &["Option"]) {
        Some(inner) => (Shape::Single, Some(unwrap_pointer(inner))),
        None => match single_generic(ty, &["Vec"]) {
            Some(inner) => (Shape::Collection, Some(unwrap_pointer(inner))),
            None => (Shape::Scalar, None),
        },
    }
}

fn unwrap_pointer(ty: Type) -> Type {
    single_generic(&ty, &["Box", "Arc"]).unwrap_or(ty)
}

/// `Wrapper<T>` -> `T` when the last path segment is one of `wrappers`.
fn single_generic(ty: &Type, wrappers: &[&str]) -> Option<Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if !wrappers.iter().any(|w| segment.ident == *w) {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first() {
        Some(GenericArgument::Type(inner)) if args.args.len() == 1 => Some(inner.clone()),
        _ => None,
    }
}

/// Same rule as `relmap_core::column_to_field`.
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

/// Same rule as `relmap_core::field_to_column`.
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

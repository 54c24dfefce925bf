//! Procedural macros for relmap.
//!
//! `#[derive(Model)]` turns a struct into a record type: it emits the static
//! field and relation tables the descriptor is built from, plus the scanner
//! and relation-assignment glue. Relation declarations are checked here at
//! compile time (kind, target table, field shape) and checked again at
//! runtime by `Descriptor::of` for hand-written impls.

use proc_macro::TokenStream;
use quote::quote;
use syn::ext::IdentExt;

mod parse;

use parse::{ModelDef, Shape, parse_model};

/// Derive macro for the `Model` trait.
///
/// # Attributes
///
/// - `#[relmap(table = "name")]` on the struct - override the table name
///   (defaults to the snake_case struct name)
/// - `#[relmap(primary_key)]` - mark the key field
/// - `#[relmap(auto_increment)]` - key is generated by the database
/// - `#[relmap(column = "name")]` - override the column name
/// - `#[relmap(ignore)]` - never read or written
/// - `#[relmap(relation = "has_one" | "has_many" | "belongs_to", table = "name")]`
///
/// The struct must also implement `Default`.
///
/// # Example
///
/// ```ignore
/// #[derive(Model, Default)]
/// struct User {
///     #[relmap(primary_key, auto_increment)]
///     id: i64,
///     name: String,
///     #[relmap(relation = "has_one", table = "profile")]
///     profile: Option<Box<Profile>>,
///     #[relmap(relation = "has_many", table = "post")]
///     posts: Vec<Post>,
/// }
/// ```
#[proc_macro_derive(Model, attributes(relmap))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    let model = match parse_model(&input) {
        Ok(m) => m,
        Err(e) => return e.to_compile_error().into(),
    };

    generate_model_impl(&model).into()
}

fn generate_model_impl(model: &ModelDef) -> proc_macro2::TokenStream {
    let name = &model.name;
    let type_name = name.unraw().to_string();
    let table_name = &model.table_name;

    let field_infos = generate_field_infos(model);
    let relation_decls = generate_relation_decls(model);
    let scan_field = generate_scan_field(model);
    let field_value = generate_field_value(model);
    let set_generated_key = generate_set_generated_key(model);
    let assign_related = generate_assign_related(model);

    quote! {
        impl ::relmap_core::Model for #name {
            const TYPE_NAME: &'static str = #type_name;
            const TABLE_NAME: &'static str = #table_name;

            fn fields() -> &'static [::relmap_core::FieldInfo] {
                static FIELDS: &[::relmap_core::FieldInfo] = &[#(#field_infos),*];
                FIELDS
            }

            fn relations() -> &'static [::relmap_core::RelationDecl] {
                static RELATIONS: &[::relmap_core::RelationDecl] = &[#(#relation_decls),*];
                RELATIONS
            }

            #scan_field
            #field_value
            #set_generated_key
            #assign_related
        }
    }
}

fn generate_field_infos(model: &ModelDef) -> Vec<proc_macro2::TokenStream> {
    model
        .fields
        .iter()
        .map(|f| {
            let ident = f.ident.unraw().to_string();
            let field_name = &f.field_name;
            let column = &f.column;
            let primary_key = f.primary_key;
            let auto_increment = f.auto_increment;
            let ignored = f.ignore;
            let relation = f.relation.is_some();
            quote! {
                ::relmap_core::FieldInfo::new(#ident, #field_name, #column)
                    .primary_key(#primary_key)
                    .auto_increment(#auto_increment)
                    .ignored(#ignored)
                    .relation(#relation)
            }
        })
        .collect()
}

fn generate_relation_decls(model: &ModelDef) -> Vec<proc_macro2::TokenStream> {
    model
        .fields
        .iter()
        .filter_map(|f| f.relation.as_ref().map(|r| (f, r)))
        .map(|(f, rel)| {
            let field_name = &f.field_name;
            let kind = &rel.kind;
            let table = &rel.table;
            let target = &rel.target;
            let target_name = quote!(#target).to_string().replace(' ', "");
            let shape = match rel.shape {
                Shape::Scalar => quote!(::relmap_core::FieldShape::Scalar),
                Shape::Single => quote!(::relmap_core::FieldShape::Single),
                Shape::Collection => quote!(::relmap_core::FieldShape::Collection),
            };
            quote! {
                ::relmap_core::RelationDecl {
                    field: #field_name,
                    kind: #kind,
                    table: #table,
                    shape: #shape,
                    target_type: #target_name,
                    target_fields: <#target as ::relmap_core::Model>::fields,
                }
            }
        })
        .collect()
}

fn generate_scan_field(model: &ModelDef) -> proc_macro2::TokenStream {
    let arms: Vec<_> = model
        .fields
        .iter()
        .filter(|f| f.is_persisted())
        .map(|f| {
            let ident = &f.ident;
            let field_name = &f.field_name;
            quote! {
                #field_name => {
                    self.#ident = ::relmap_core::FromValue::from_value(value)?;
                    ::core::result::Result::Ok(true)
                }
            }
        })
        .collect();

    quote! {
        #[allow(unused_variables)]
        fn scan_field(
            &mut self,
            field: &str,
            value: &::relmap_core::Value,
        ) -> ::relmap_core::Result<bool> {
            match field {
                #(#arms)*
                _ => ::core::result::Result::Ok(false),
            }
        }
    }
}

fn generate_field_value(model: &ModelDef) -> proc_macro2::TokenStream {
    let arms: Vec<_> = model
        .fields
        .iter()
        .filter(|f| f.is_persisted())
        .map(|f| {
            let ident = &f.ident;
            let field_name = &f.field_name;
            quote! {
                #field_name => ::core::option::Option::Some(
                    ::relmap_core::Value::from(::core::clone::Clone::clone(&self.#ident))
                ),
            }
        })
        .collect();

    quote! {
        fn field_value(&self, field: &str) -> ::core::option::Option<::relmap_core::Value> {
            match field {
                #(#arms)*
                _ => ::core::option::Option::None,
            }
        }
    }
}

fn generate_set_generated_key(model: &ModelDef) -> proc_macro2::TokenStream {
    let Some(key) = model.auto_key() else {
        return quote! {};
    };
    let ident = &key.ident;
    quote! {
        fn set_generated_key(&mut self, id: i64) -> ::relmap_core::Result<()> {
            self.#ident = ::relmap_core::FromValue::from_value(&::relmap_core::Value::BigInt(id))?;
            ::core::result::Result::Ok(())
        }
    }
}

fn generate_assign_related(model: &ModelDef) -> proc_macro2::TokenStream {
    let arms: Vec<_> = model
        .fields
        .iter()
        .filter_map(|f| f.relation.as_ref().map(|r| (f, r)))
        .map(|(f, rel)| {
            let ident = &f.ident;
            let field_name = &f.field_name;
            let target = &rel.target;
            let body = if rel.shape == Shape::Collection {
                quote! {
                    self.#ident = rows
                        .iter()
                        .map(|row| {
                            <#target as ::relmap_core::Model>::from_row(row)
                                .map(::core::convert::From::from)
                        })
                        .collect::<::relmap_core::Result<::std::vec::Vec<_>>>()?;
                }
            } else {
                quote! {
                    for row in rows {
                        self.#ident = ::core::option::Option::Some(
                            ::core::convert::From::from(
                                <#target as ::relmap_core::Model>::from_row(row)?
                            )
                        );
                    }
                }
            };
            quote! {
                #field_name => {
                    #body
                    ::core::result::Result::Ok(())
                }
            }
        })
        .collect();

    if arms.is_empty() {
        return quote! {};
    }

    let type_name = model.name.unraw().to_string();
    quote! {
        fn assign_related(
            &mut self,
            field: &str,
            rows: &[&::relmap_core::Row],
        ) -> ::relmap_core::Result<()> {
            match field {
                #(#arms)*
                _ => ::core::result::Result::Err(::relmap_core::Error::shape(
                    "relation field",
                    ::std::format!("{}.{} is not a relation field", #type_name, field),
                )),
            }
        }
    }
}

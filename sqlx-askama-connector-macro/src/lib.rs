use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{DeriveInput, GenericParam, LifetimeParam, parse_macro_input};

/// Derive macro rendering SQL templates with Askama against a `TemplateArgs` set.
///
/// # Attributes
///
/// ## `#[template(...)]` (Required)
/// Passed through unchanged to Askama:
/// - `source` or `path`: template content or file
/// - `ext`: file extension for Askama (`txt` renders without escaping)
/// - `print`, `config`, ...
///
/// Inside the template, struct fields are reachable by name and the argument
/// set through these helpers:
/// - `check("key")`: argument is set and truthy, or condition holds
/// - `render("key")`: argument value or condition result as text
/// - `get("key")`: raw argument value
/// - `count()` / `not_count()`: COUNT-wrapping flag of the template
///
/// # Example
/// ```ignore
/// use sqlx_askama_connector::SqlRenderer;
///
/// #[derive(SqlRenderer)]
/// #[template(
///     source = r#"
///     SELECT * FROM {{ table }}
///     {% if check("name") %} WHERE name = :name {% endif %}
///     "#,
///     ext = "txt"
/// )]
/// struct UserQuery {
///     table: &'static str,
/// }
/// ```
///
/// # Generated Implementation
/// A `<Name>Wrapper` struct with the visibility of the input, deriving
/// `askama::Template`, and an
/// implementation of `SqlRenderer` for the struct.
///
/// # Note
/// The generated code requires `askama` as a dependency of the calling crate.
/// Fields named `data` or `args` are shadowed by the wrapper's own fields.
#[proc_macro_derive(SqlRenderer, attributes(template))]
pub fn sql_renderer(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name: &syn::Ident = &input.ident;
    let vis = &input.vis;
    let generics = &input.generics;

    let wrapper_name = format_ident!("{}Wrapper", name);

    // 收集所有template属性
    let template_attrs: Vec<_> = input
        .attrs
        .iter()
        .filter(|attr| attr.path().is_ident("template"))
        .collect();

    // the wrapper borrows data and arguments for its own lifetime
    let render_lifetime = syn::Lifetime::new("'__sql", proc_macro2::Span::call_site());
    let mut wrapper_generics = generics.clone();
    wrapper_generics.params.insert(
        0,
        GenericParam::Lifetime(LifetimeParam::new(render_lifetime.clone())),
    );

    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    let (wrapper_impl_generics, wrapper_ty_generics, _) = wrapper_generics.split_for_impl();

    let expanded = quote! {
        #[derive(::askama::Template)]
        #(#template_attrs)*
        #vis struct #wrapper_name #wrapper_generics #where_clause {
            #vis data: &#render_lifetime #name #ty_generics,
            #vis args: &#render_lifetime ::sqlx_askama_connector::TemplateArgs,
        }

        impl #wrapper_impl_generics ::std::ops::Deref for #wrapper_name #wrapper_ty_generics
            #where_clause
        {
            type Target = #name #ty_generics;

            fn deref(&self) -> &Self::Target {
                self.data
            }
        }

        // templates call only the helpers they need
        #[allow(dead_code)]
        impl #wrapper_impl_generics #wrapper_name #wrapper_ty_generics
            #where_clause
        {
            #vis fn check(&self, key: &str) -> bool {
                self.args.check(key)
            }

            #vis fn render(&self, key: &str) -> ::std::string::String {
                self.args.render(key)
            }

            #vis fn get(&self, key: &str) -> ::std::option::Option<&::sqlx_askama_connector::Value> {
                self.args.get(key)
            }

            #vis fn count(&self) -> bool {
                self.args.count()
            }

            #vis fn not_count(&self) -> bool {
                self.args.not_count()
            }
        }

        impl #impl_generics ::sqlx_askama_connector::SqlRenderer for #name #ty_generics
            #where_clause
        {
            fn render_sql(
                &self,
                args: &::sqlx_askama_connector::TemplateArgs,
            ) -> ::std::result::Result<::std::string::String, ::sqlx_askama_connector::Error> {
                let wrapper = #wrapper_name { data: self, args };
                let sql = ::askama::Template::render(&wrapper)?;
                ::std::result::Result::Ok(sql)
            }
        }
    };

    expanded.into()
}

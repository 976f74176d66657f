use darling::ast::Data;
use darling::util::{Ignored, PathList};
use darling::{FromDeriveInput, FromField};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, GenericArgument, Ident, PathArguments, Type};

#[derive(FromDeriveInput)]
#[darling(attributes(injectable), supports(struct_named))]
struct InjectableInput {
    ident: Ident,
    generics: syn::Generics,
    data: Data<Ignored, InjectField>,
    #[darling(default)]
    supertypes: PathList,
}

#[derive(FromField)]
#[darling(attributes(inject))]
struct InjectField {
    ident: Option<Ident>,
    ty: Type,
    #[darling(default)]
    lookup: bool,
    #[darling(default)]
    namespace: Option<String>,
    #[darling(default)]
    property: bool,
}

/// How a field is declared and read back out of the arguments.
enum Param<'a> {
    Injected(&'a Type),
    Contract(&'a Type),
    Forward(&'a Type),
    Lookup(&'a Type),
    Namespace(&'a Type, &'a str),
    Literal(&'a Type),
}

impl Param<'_> {
    fn dependency(&self) -> TokenStream2 {
        match self {
            Param::Injected(ty) => quote!(::keystone::Dependency::injected::<#ty>()),
            Param::Contract(ty) => quote!(::keystone::Dependency::contract::<#ty>()),
            Param::Forward(ty) => quote!(::keystone::Dependency::forward::<#ty>()),
            Param::Lookup(ty) => quote!(::keystone::Dependency::lookup::<#ty>()),
            Param::Namespace(_, ns) => quote!(::keystone::Dependency::namespace(#ns)),
            Param::Literal(ty) => quote!(::keystone::Dependency::literal::<#ty>()),
        }
    }

    fn read(&self, position: usize) -> TokenStream2 {
        match self {
            Param::Injected(ty) | Param::Lookup(ty) | Param::Namespace(ty, _) => {
                quote!(args.get::<#ty>(#position)?)
            }
            Param::Contract(ty) => quote!(args.contract::<#ty>(#position)?),
            Param::Forward(ty) => quote!(args.lazy::<#ty>(#position)?),
            Param::Literal(ty) => quote!(args.literal::<#ty>(#position)?),
        }
    }
}

pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match InjectableInput::from_derive_input(&input) {
        Ok(parsed) => TokenStream::from(generate_injectable_impl(&parsed)),
        Err(e) => TokenStream::from(e.write_errors()),
    }
}

fn generate_injectable_impl(input: &InjectableInput) -> TokenStream2 {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Data::Struct(fields) = &input.data else {
        return syn::Error::new_spanned(struct_name, "#[derive(Injectable)] can only be applied to structs")
            .to_compile_error();
    };

    let mut dependencies = Vec::new();
    let mut initializers = Vec::new();
    let mut property_arms = Vec::new();

    for field in &fields.fields {
        let Some(field_name) = &field.ident else {
            continue;
        };

        if field.property {
            let Some(inner) = option_arc_inner(&field.ty) else {
                return syn::Error::new_spanned(
                    &field.ty,
                    "#[inject(property)] fields must be Option<Arc<T>>",
                )
                .to_compile_error();
            };
            let property = field_name.to_string();
            initializers.push(quote!(#field_name: ::std::option::Option::None));
            property_arms.push(quote! {
                #property => {
                    self.#field_name = ::std::option::Option::Some(
                        ::keystone::di::downcast::<#inner>(#property, value)?
                    );
                    ::std::result::Result::Ok(())
                }
            });
            continue;
        }

        let param = match classify(field) {
            Ok(param) => param,
            Err(e) => return e.to_compile_error(),
        };
        let position = dependencies.len();
        let read = param.read(position);
        dependencies.push(param.dependency());
        initializers.push(quote!(#field_name: #read));
    }

    let supertypes = input.supertypes.iter().map(|path| {
        quote!(::std::any::TypeId::of::<#path>())
    });
    let supertypes_fn = if input.supertypes.is_empty() {
        quote!()
    } else {
        quote! {
            fn supertypes() -> ::std::vec::Vec<::std::any::TypeId> {
                ::std::vec![#(#supertypes),*]
            }
        }
    };

    let inject_property_fn = if property_arms.is_empty() {
        quote!()
    } else {
        quote! {
            fn inject_property(
                &mut self,
                property: &str,
                value: ::keystone::Value,
            ) -> ::keystone::Result<()> {
                match property {
                    #(#property_arms)*
                    _ => ::std::result::Result::Err(::keystone::KeystoneError::UnknownProperty {
                        owner: ::std::any::type_name::<Self>().to_string(),
                        property: property.to_string(),
                    }),
                }
            }
        }
    };

    let args_binding = if dependencies.is_empty() {
        quote!(_args)
    } else {
        quote!(args)
    };

    quote! {
        impl #impl_generics ::keystone::Injectable for #struct_name #ty_generics #where_clause {
            fn dependencies() -> ::std::vec::Vec<::keystone::Dependency> {
                ::std::vec![#(#dependencies),*]
            }

            fn construct(#args_binding: ::keystone::Arguments) -> ::keystone::Result<Self> {
                ::std::result::Result::Ok(Self {
                    #(#initializers),*
                })
            }

            #supertypes_fn

            #inject_property_fn
        }
    }
}

fn classify(field: &InjectField) -> syn::Result<Param<'_>> {
    if let Some(inner) = generic_inner(&field.ty, "Arc") {
        if let Some(ns) = &field.namespace {
            return Ok(Param::Namespace(inner, ns));
        }
        if field.lookup {
            return Ok(Param::Lookup(inner));
        }
        return Ok(match inner {
            Type::TraitObject(_) => Param::Contract(inner),
            _ => Param::Injected(inner),
        });
    }

    if field.lookup || field.namespace.is_some() {
        return Err(syn::Error::new_spanned(
            &field.ty,
            "#[inject(lookup)] and #[inject(namespace)] fields must be Arc<T>",
        ));
    }

    if let Some(inner) = generic_inner(&field.ty, "Lazy") {
        return Ok(Param::Forward(inner));
    }
    Ok(Param::Literal(&field.ty))
}

/// `T` out of `Wrapper<T>`, matching on the last path segment.
fn generic_inner<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn option_arc_inner(ty: &Type) -> Option<&Type> {
    generic_inner(ty, "Option").and_then(|inner| generic_inner(inner, "Arc"))
}

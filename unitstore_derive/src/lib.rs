use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    Data, DataEnum, DeriveInput, Field, Fields, Ident, Index, LitStr, Type, parse_macro_input,
    spanned::Spanned,
};

/// Implements `unitstore::Entity`.
///
/// The key is the field marked `#[entity(key)]`, or else the field named
/// `id`. `#[entity(type = "...")]` sets the partition name. Without it the
/// bare struct name is used, so two entities with the same struct name in
/// different modules share a partition and fail reads with `TypeMismatch`.
/// Give such structs distinct type names.
#[proc_macro_derive(Entity, attributes(entity))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_entity(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[proc_macro_derive(StructuralClone, attributes(structural))]
pub fn derive_structural_clone(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_structural_clone(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

// ---------------------------------------------------------------------------
// #[derive(Entity)]
// ---------------------------------------------------------------------------

struct EntityOptions {
    type_name: Option<String>,
}

fn expand_entity(input: DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.generics,
            "Entity does not support generic structs yet",
        ));
    }

    let options = parse_entity_options(&input.attrs)?;

    let data_struct = match input.data {
        Data::Struct(data) => data,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Entity can only be derived for structs",
            ));
        }
    };

    let named_fields = match data_struct.fields {
        Fields::Named(fields) => fields,
        _ => {
            return Err(syn::Error::new(
                struct_name.span(),
                "Entity requires named fields",
            ));
        }
    };

    let mut key_field: Option<Ident> = None;
    let mut id_field: Option<(Ident, &Field)> = None;
    for field in &named_fields.named {
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(field.span(), "Entity requires named fields"))?;

        if has_entity_key_attr(field)? {
            check_key_type(field)?;
            if key_field.is_some() {
                return Err(syn::Error::new(
                    field.span(),
                    "Only one field can be marked with #[entity(key)]",
                ));
            }
            key_field = Some(ident.clone());
        }

        if ident == "id" {
            id_field = Some((ident, field));
        }
    }

    let id_field = match id_field {
        Some((ident, field)) if key_field.is_none() => {
            check_key_type(field)?;
            Some(ident)
        }
        _ => None,
    };

    let key_field = key_field.or(id_field).ok_or_else(|| {
        syn::Error::new(
            struct_name.span(),
            "Entity needs an `id` field or a field marked with #[entity(key)]",
        )
    })?;

    let type_name = options
        .type_name
        .unwrap_or_else(|| struct_name.to_string());
    let type_lit = LitStr::new(&type_name, struct_name.span());

    Ok(quote! {
        impl ::unitstore::Entity for #struct_name {
            const ENTITY_TYPE: ::unitstore::EntityType =
                ::unitstore::EntityType::from_static(#type_lit);

            fn key(&self) -> ::unitstore::EntityKey {
                ::unitstore::EntityKey::from(::core::clone::Clone::clone(&self.#key_field))
            }
        }
    })
}

fn parse_entity_options(attrs: &[syn::Attribute]) -> syn::Result<EntityOptions> {
    let mut options = EntityOptions { type_name: None };

    for attr in attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("type") || meta.path.is_ident("name") {
                let value = meta.value()?;
                let lit: LitStr = value.parse()?;
                if lit.value().trim().is_empty() {
                    return Err(meta.error("entity type must not be empty"));
                }
                options.type_name = Some(lit.value());
                return Ok(());
            }

            Err(meta.error("Unsupported entity attribute. Supported: type = \"...\""))
        })?;
    }

    Ok(options)
}

fn has_entity_key_attr(field: &Field) -> syn::Result<bool> {
    let mut is_key = false;

    for attr in &field.attrs {
        if !attr.path().is_ident("entity") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("key") {
                is_key = true;
                return Ok(());
            }

            Err(meta.error("Unsupported #[entity(...)] field option. Supported: key"))
        })?;
    }

    Ok(is_key)
}

const SUPPORTED_KEY_TYPES: &str = "i8, i16, i32, i64, u8, u16, u32, String or Uuid";

/// Rejects key types with no lossless conversion into `EntityKey`.
/// Other types are left to their own `From` impls.
fn check_key_type(field: &Field) -> syn::Result<()> {
    let Type::Path(path) = &field.ty else {
        return Ok(());
    };
    let Some(segment) = path.path.segments.last() else {
        return Ok(());
    };

    let name = segment.ident.to_string();
    if matches!(
        name.as_str(),
        "u64" | "u128" | "usize" | "i128" | "isize" | "f32" | "f64" | "bool" | "char"
    ) {
        return Err(syn::Error::new_spanned(
            &field.ty,
            format!(
                "`{}` cannot be an entity key. Supported key types: {}",
                name, SUPPORTED_KEY_TYPES
            ),
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// #[derive(StructuralClone)]
// ---------------------------------------------------------------------------

fn expand_structural_clone(input: DeriveInput) -> syn::Result<TokenStream2> {
    let type_name = input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            input.generics,
            "StructuralClone does not support generic types yet",
        ));
    }

    let (clone_body, freeze_body) = match input.data {
        Data::Struct(data) => struct_bodies(&data.fields)?,
        Data::Enum(data) => enum_bodies(&data)?,
        Data::Union(_) => {
            return Err(syn::Error::new(
                type_name.span(),
                "StructuralClone cannot be derived for unions",
            ));
        }
    };

    Ok(quote! {
        impl ::unitstore::StructuralClone for #type_name {
            #[allow(unused_variables)]
            fn structural_clone(&self, ctx: &mut ::unitstore::CloneContext) -> Self {
                #clone_body
            }

            #[allow(unused_variables)]
            fn freeze(&self, ctx: &mut ::unitstore::FreezeContext) {
                #freeze_body
            }
        }
    })
}

fn struct_bodies(fields: &Fields) -> syn::Result<(TokenStream2, TokenStream2)> {
    match fields {
        Fields::Named(named) => {
            let mut inits = Vec::new();
            let mut freezes = Vec::new();
            for field in &named.named {
                let ident = field.ident.as_ref().ok_or_else(|| {
                    syn::Error::new(field.span(), "expected a named field")
                })?;
                let shallow = is_shallow(field)?;
                let access = quote!(&self.#ident);
                let value = clone_expr(&access, shallow);
                inits.push(quote!(#ident: #value));
                freezes.push(freeze_stmt(&access, shallow));
            }
            Ok((quote!(Self { #(#inits,)* }), quote!(#(#freezes)*)))
        }
        Fields::Unnamed(unnamed) => {
            let mut inits = Vec::new();
            let mut freezes = Vec::new();
            for (position, field) in unnamed.unnamed.iter().enumerate() {
                let index = Index::from(position);
                let shallow = is_shallow(field)?;
                let access = quote!(&self.#index);
                inits.push(clone_expr(&access, shallow));
                freezes.push(freeze_stmt(&access, shallow));
            }
            Ok((quote!(Self(#(#inits,)*)), quote!(#(#freezes)*)))
        }
        Fields::Unit => Ok((quote!(Self), quote!())),
    }
}

fn enum_bodies(data: &DataEnum) -> syn::Result<(TokenStream2, TokenStream2)> {
    let mut clone_arms = Vec::new();
    let mut freeze_arms = Vec::new();

    for variant in &data.variants {
        let variant_ident = &variant.ident;
        match &variant.fields {
            Fields::Named(named) => {
                let mut patterns = Vec::new();
                let mut inits = Vec::new();
                let mut freezes = Vec::new();
                for (position, field) in named.named.iter().enumerate() {
                    let ident = field.ident.as_ref().ok_or_else(|| {
                        syn::Error::new(field.span(), "expected a named field")
                    })?;
                    let binding = format_ident!("__field{}", position);
                    let shallow = is_shallow(field)?;
                    let access = quote!(#binding);
                    patterns.push(quote!(#ident: #binding));
                    let value = clone_expr(&access, shallow);
                    inits.push(quote!(#ident: #value));
                    freezes.push(freeze_stmt(&access, shallow));
                }
                clone_arms.push(quote! {
                    Self::#variant_ident { #(#patterns,)* } => Self::#variant_ident { #(#inits,)* },
                });
                freeze_arms.push(quote! {
                    Self::#variant_ident { #(#patterns,)* } => { #(#freezes)* }
                });
            }
            Fields::Unnamed(unnamed) => {
                let mut bindings = Vec::new();
                let mut inits = Vec::new();
                let mut freezes = Vec::new();
                for (position, field) in unnamed.unnamed.iter().enumerate() {
                    let binding = format_ident!("__field{}", position);
                    let shallow = is_shallow(field)?;
                    let access = quote!(#binding);
                    inits.push(clone_expr(&access, shallow));
                    freezes.push(freeze_stmt(&access, shallow));
                    bindings.push(binding);
                }
                clone_arms.push(quote! {
                    Self::#variant_ident(#(#bindings,)*) => Self::#variant_ident(#(#inits,)*),
                });
                freeze_arms.push(quote! {
                    Self::#variant_ident(#(#bindings,)*) => { #(#freezes)* }
                });
            }
            Fields::Unit => {
                clone_arms.push(quote!(Self::#variant_ident => Self::#variant_ident,));
                freeze_arms.push(quote!(Self::#variant_ident => {}));
            }
        }
    }

    if clone_arms.is_empty() {
        return Ok((quote!(match *self {}), quote!()));
    }

    Ok((
        quote!(match self { #(#clone_arms)* }),
        quote!(match self { #(#freeze_arms)* }),
    ))
}

fn clone_expr(access: &TokenStream2, shallow: bool) -> TokenStream2 {
    if shallow {
        quote!(::core::clone::Clone::clone(#access))
    } else {
        quote!(::unitstore::StructuralClone::structural_clone(#access, ctx))
    }
}

fn freeze_stmt(access: &TokenStream2, shallow: bool) -> TokenStream2 {
    if shallow {
        quote!()
    } else {
        quote!(::unitstore::StructuralClone::freeze(#access, ctx);)
    }
}

fn is_shallow(field: &Field) -> syn::Result<bool> {
    let mut shallow = false;

    for attr in &field.attrs {
        if !attr.path().is_ident("structural") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("shallow") {
                shallow = true;
                return Ok(());
            }

            Err(meta.error("Unsupported #[structural(...)] option. Supported: shallow"))
        })?;
    }

    Ok(shallow)
}

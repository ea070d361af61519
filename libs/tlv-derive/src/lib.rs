//! This crate provides procedural macros for the `tlv` crate.
//!
//! `#[derive(Decode)]` on a struct with named fields decodes a SEQUENCE whose
//! elements appear in field order. On a fieldless enum with explicit
//! discriminants it decodes an ENUMERATED with a closed value set.
//!
//! `#[derive(Choice)]` on an enum of single-field tuple variants resolves a
//! captured `tlv::RawValue` by its context-specific tag number.
//!
//! Field and variant annotations:
//!
//! - `#[tlv(tag = N)]`: implicit context-specific tag `[N]`.
//! - `#[tlv(tag = N, explicit)]`: explicit context-specific tag `[N]`.
//! - `#[tlv(optional)]`: the field is skipped when the next tag does not
//!   match. Use with `Option<T>`, or with `Vec<T>` and `sequence_of`.
//! - `#[tlv(sequence_of)]`: the `Vec<T>` field is a SEQUENCE OF `T`.
//! - `#[tlv(other)]`: on one ENUMERATED variant, the value decoded for any
//!   number outside the declared set.
//!
//! A struct annotated with `#[tlv(allow_trailing)]` ignores elements after
//! its last declared field.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, spanned::Spanned, DeriveInput};

/// Generates an implementation of the `Decode` trait for the annotated
/// struct or enumeration.
#[proc_macro_derive(Decode, attributes(tlv))]
pub fn decode_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let result = match &input.data {
        syn::Data::Struct(data) => expand_sequence(&input, data),
        syn::Data::Enum(data) => expand_enumerated(&input, data),
        syn::Data::Union(_) => Err(syn::Error::new(
            input.span(),
            "only structs and enums are supported",
        )),
    };

    result.unwrap_or_else(syn::Error::into_compile_error).into()
}

/// Generates an implementation of the `Choice` trait for the annotated enum.
#[proc_macro_derive(Choice, attributes(tlv))]
pub fn choice_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let result = match &input.data {
        syn::Data::Enum(data) => expand_choice(&input, data),
        _ => Err(syn::Error::new(input.span(), "only enums are supported")),
    };

    result.unwrap_or_else(syn::Error::into_compile_error).into()
}

#[derive(Debug, Default)]
struct TlvOptions {
    tag: Option<u32>,
    explicit: bool,
    optional: bool,
    sequence_of: bool,
    allow_trailing: bool,
    other: bool,
}

impl TlvOptions {
    fn tagging(&self) -> TokenStream2 {
        match (self.tag, self.explicit) {
            (None, _) => quote! { tlv::Tagging::Natural },
            (Some(tag), false) => quote! { tlv::Tagging::Implicit(#tag) },
            (Some(tag), true) => quote! { tlv::Tagging::Explicit(#tag) },
        }
    }
}

fn parse_tlv_options(attrs: &[syn::Attribute]) -> Result<TlvOptions, syn::Error> {
    let mut options = TlvOptions::default();

    for attr in attrs.iter().filter(|attr| attr.path().is_ident("tlv")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("tag") {
                let lit: syn::LitInt = meta.value()?.parse()?;
                options.tag = Some(lit.base10_parse()?);
            } else if meta.path.is_ident("explicit") {
                options.explicit = true;
            } else if meta.path.is_ident("optional") {
                options.optional = true;
            } else if meta.path.is_ident("sequence_of") {
                options.sequence_of = true;
            } else if meta.path.is_ident("allow_trailing") {
                options.allow_trailing = true;
            } else if meta.path.is_ident("other") {
                options.other = true;
            } else {
                return Err(syn::Error::new(
                    meta.path.span(),
                    "expected `tag`, `explicit`, `optional`, `sequence_of`, `allow_trailing`, or `other`",
                ));
            }
            Ok(())
        })?;

        if options.explicit && options.tag.is_none() {
            return Err(syn::Error::new(
                attr.span(),
                "`explicit` requires a tag, expected #[tlv(tag = <tag>, explicit)]",
            ));
        }
    }

    Ok(options)
}

#[derive(Debug)]
struct TlvEntity {
    ident: syn::Ident,
    options: TlvOptions,
}

fn parse_field_tlv_entity(field: &syn::Field) -> Result<TlvEntity, syn::Error> {
    let ident = field.ident.clone().ok_or_else(|| {
        syn::Error::new(
            field.span(),
            "missing field identifier, expected named fields",
        )
    })?;

    Ok(TlvEntity {
        ident,
        options: parse_tlv_options(&field.attrs)?,
    })
}

fn expand_sequence(input: &DeriveInput, data: &syn::DataStruct) -> Result<TokenStream2, syn::Error> {
    let syn::Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new(
            input.span(),
            "only named fields are supported",
        ));
    };

    let name = &input.ident;
    let name_str = name.to_string();
    let struct_options = parse_tlv_options(&input.attrs)?;
    let entities = fields
        .named
        .iter()
        .map(parse_field_tlv_entity)
        .collect::<Result<Vec<_>, _>>()?;

    let statements = entities.iter().map(|entity| {
        let ident = &entity.ident;
        let ident_str = ident.to_string();
        let tagging = entity.options.tagging();
        let optional = entity.options.optional;
        let decode = if entity.options.sequence_of {
            quote! { decoder.decode_sequence_of_field(#tagging, #optional) }
        } else if optional {
            quote! { decoder.decode_optional_field(#tagging) }
        } else {
            quote! { decoder.decode_field(#tagging) }
        };
        quote! {
            let #ident = #decode.map_err(|e| e.in_field(#name_str, #ident_str))?;
        }
    });

    let finish = if struct_options.allow_trailing {
        quote! {}
    } else {
        quote! { decoder.finish(#name_str)?; }
    };

    let idents = entities.iter().map(|entity| &entity.ident);
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics tlv::Decode for #name #ty_generics #where_clause {
            fn accepts(tag: &tlv::Tag) -> bool {
                *tag == tlv::Tag::SEQUENCE
            }

            fn decode_contents(_tag: &tlv::Tag, contents: &[u8]) -> tlv::Result<Self> {
                let mut decoder = tlv::Decoder::new(contents);
                #(#statements)*
                #finish
                Ok(Self { #(#idents),* })
            }
        }
    })
}

fn expand_enumerated(input: &DeriveInput, data: &syn::DataEnum) -> Result<TokenStream2, syn::Error> {
    let name = &input.ident;
    let name_str = name.to_string();

    let mut variants = Vec::new();
    let mut discriminants = Vec::new();
    let mut other = None;
    for variant in &data.variants {
        if parse_tlv_options(&variant.attrs)?.other {
            if other.is_some() {
                return Err(syn::Error::new(
                    variant.span(),
                    "only one variant may be marked #[tlv(other)]",
                ));
            }
            other = Some(&variant.ident);
        }
        if !matches!(variant.fields, syn::Fields::Unit) {
            return Err(syn::Error::new(
                variant.span(),
                "ENUMERATED variants must not have fields, use #[derive(Choice)] for CHOICE types",
            ));
        }
        let Some((_, discriminant)) = &variant.discriminant else {
            return Err(syn::Error::new(
                variant.span(),
                "ENUMERATED variants need an explicit discriminant",
            ));
        };
        variants.push(&variant.ident);
        discriminants.push(discriminant);
    }

    let unknown = match other {
        Some(other) => quote! { Ok(Self::#other) },
        None => quote! {
            Err(tlv::Error::InvalidEnumerated {
                type_name: #name_str,
                value,
            })
        },
    };

    Ok(quote! {
        impl tlv::Decode for #name {
            fn accepts(tag: &tlv::Tag) -> bool {
                *tag == tlv::Tag::ENUMERATED
            }

            fn decode_contents(_tag: &tlv::Tag, contents: &[u8]) -> tlv::Result<Self> {
                let value = tlv::decode_integer_contents(contents)?;
                #(
                    if value == (#discriminants) as i64 {
                        return Ok(Self::#variants);
                    }
                )*
                #unknown
            }
        }
    })
}

fn expand_choice(input: &DeriveInput, data: &syn::DataEnum) -> Result<TokenStream2, syn::Error> {
    let name = &input.ident;
    let name_str = name.to_string();

    let mut variants = Vec::new();
    let mut tags = Vec::new();
    let mut resolvers = Vec::new();
    for variant in &data.variants {
        let field = match &variant.fields {
            syn::Fields::Unnamed(fields) if fields.unnamed.len() == 1 => &fields.unnamed[0],
            _ => {
                return Err(syn::Error::new(
                    variant.span(),
                    "CHOICE variants must hold exactly one unnamed field",
                ))
            }
        };
        let options = parse_tlv_options(&variant.attrs)?;
        let Some(tag) = options.tag else {
            return Err(syn::Error::new(
                variant.span(),
                "missing tag attribute on variant, expected #[tlv(tag = <tag>)]",
            ));
        };

        let ty = &field.ty;
        let variant_str = variant.ident.to_string();
        let resolve = if options.sequence_of {
            quote! {
                tlv::decode_sequence_of_contents(&raw.contents).and_then(|elements: #ty| {
                    if elements.is_empty() {
                        Err(tlv::Error::EmptySequenceOf)
                    } else {
                        Ok(elements)
                    }
                })
            }
        } else {
            quote! { <#ty as tlv::Decode>::decode_contents(&raw.tag, &raw.contents) }
        };

        let variant_ident = &variant.ident;
        resolvers.push(quote! {
            #resolve
                .map(Self::#variant_ident)
                .map_err(|e| e.in_field(#name_str, #variant_str))
        });
        variants.push(variant_ident);
        tags.push(tag);
    }

    Ok(quote! {
        impl tlv::Choice for #name {
            const NAME: &'static str = #name_str;

            fn resolve(raw: &tlv::RawValue) -> tlv::Result<Self> {
                if raw.tag.class != tlv::Class::ContextSpecific {
                    return Err(tlv::Error::UnknownVariant {
                        choice: #name_str,
                        tag: raw.tag,
                    });
                }

                match raw.tag.number {
                    #( #tags => #resolvers, )*
                    _ => Err(tlv::Error::UnknownVariant {
                        choice: #name_str,
                        tag: raw.tag,
                    }),
                }
            }

            fn tag_number(&self) -> u32 {
                match self {
                    #( Self::#variants(_) => #tags, )*
                }
            }
        }
    })
}

use proc_macro::TokenStream;

use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident, parse_macro_input};

fn make_error(ident: &Ident, msg: &str) -> TokenStream {
    syn::Error::new_spanned(ident, msg).to_compile_error().into()
}

/// Derives `wire::Encode` and `wire::Decode` for a fixed-size struct by
/// (de)serializing each field in declaration order. Every field's type must
/// itself implement `Encode`/`Decode` (primitives and fixed-size arrays of
/// them do, via `wire`; nested `#[derive(Packed)]` structs do too).
#[proc_macro_derive(Packed)]
pub fn derive_packed(input: TokenStream) -> TokenStream {
    let DeriveInput {
        ident, data, generics, ..
    } = parse_macro_input!(input as DeriveInput);

    let data_struct = match data {
        Data::Struct(data_struct) => data_struct,
        _ => return make_error(&ident, "Packed can only be derived for structs"),
    };

    let fields = match data_struct.fields {
        Fields::Named(named) => named.named,
        _ => return make_error(&ident, "Packed requires a struct with named fields"),
    };

    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let field_names: Vec<_> = fields.iter().map(|f| f.ident.clone().unwrap()).collect();
    let field_types: Vec<_> = fields.iter().map(|f| f.ty.clone()).collect();

    let encode_body = field_names.iter().map(|name| {
        quote! {
            acc += wire::Encode::encode(&self.#name, endian, &mut target[acc..])?;
        }
    });

    let decode_body = field_names.iter().zip(field_types.iter()).map(|(name, ty)| {
        quote! {
            let (#name, n) = <#ty as wire::Decode>::decode(endian, &input[acc..])?;
            acc += n;
        }
    });

    let expanded = quote! {
        impl #impl_generics wire::Encode for #ident #ty_generics #where_clause {
            fn encode(&self, endian: wire::Endian, target: &mut [u8]) -> Result<usize, wire::EncodeError> {
                let mut acc: usize = 0;
                #(#encode_body)*
                Ok(acc)
            }
        }

        impl #impl_generics wire::Decode for #ident #ty_generics #where_clause {
            fn decode(endian: wire::Endian, input: &[u8]) -> Result<(Self, usize), wire::DecodeError> {
                let mut acc: usize = 0;
                #(#decode_body)*
                Ok((#ident { #(#field_names),* }, acc))
            }
        }
    };

    expanded.into()
}

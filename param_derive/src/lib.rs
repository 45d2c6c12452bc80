use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DataStruct, DeriveInput, Fields};

/// Implements `crate::params::Params` for a struct whose named fields are all
/// `Param`s. Fields are indexed in declaration order and can be looked up by
/// their field name.
#[proc_macro_derive(Params)]
pub fn derive_params(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    let struct_name = ast.ident;
    let fields = match ast.data {
        Data::Struct(DataStruct {
            fields: Fields::Named(fields),
            ..
        }) => fields,
        _ => {
            return syn::Error::new(
                struct_name.span(),
                "Params can only be derived for a struct with named fields",
            )
            .to_compile_error()
            .into();
        }
    };

    let mut num_params: usize = 0;
    let mut index_arms = Vec::new();
    let mut name_arms = Vec::new();

    for (index, field) in fields.named.iter().enumerate() {
        if let Some(ident) = &field.ident {
            num_params += 1;
            let name = ident.to_string();
            index_arms.push(quote! {
                #index => &self.#ident
            });
            name_arms.push(quote! {
                #name => Some(&self.#ident)
            });
        }
    }
    index_arms.push(quote! {
        _ => panic!("parameter index {} out of range", idx)
    });
    name_arms.push(quote! {
        _ => None
    });

    quote! {
        impl crate::params::Params for #struct_name {
            fn len(&self) -> usize {
                #num_params
            }

            fn get_param(&self, idx: usize) -> &crate::params::Param {
                match idx {
                    #(#index_arms),*
                }
            }

            fn find(&self, name: &str) -> Option<&crate::params::Param> {
                match name {
                    #(#name_arms),*
                }
            }
        }
    }
    .into()
}

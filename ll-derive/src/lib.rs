use ll_core::grammar::{Symbol, SymbolConvention, Terminal};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{
    parse::{Parse, ParseStream},
    parse_macro_input,
    spanned::Spanned,
    Data, DataEnum, DeriveInput, Generics, Ident, LitChar,
};

/// The grammar symbol a variant is classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TerminalKind {
    Char(char),
    Eof,
}

impl Parse for TerminalKind {
    fn parse(input: ParseStream<'_>) -> syn::Result<Self> {
        let lookahead = input.lookahead1();
        if lookahead.peek(LitChar) {
            let lit: LitChar = input.parse()?;
            let c = lit.value();

            // only characters the rule-set reader treats as plain
            // terminals can be matched against a grammar.
            match SymbolConvention::default().classify(c) {
                Symbol::Terminal(Terminal::Char(_)) => Ok(Self::Char(c)),
                _ => Err(syn::Error::new(
                    lit.span(),
                    format!("'{}' is not a valid terminal character", c),
                )),
            }
        } else if lookahead.peek(Ident) {
            let ident: Ident = input.parse()?;
            if ident == "eof" {
                Ok(Self::Eof)
            } else {
                Err(syn::Error::new(ident.span(), "expected a char literal or `eof`"))
            }
        } else {
            Err(lookahead.error())
        }
    }
}

struct AnnotatedVariant {
    ident: Ident,
    kind: TerminalKind,
}

/// Represents the token enum with each variant's terminal classification.
struct TerminalAnnotatedEnum {
    enum_ident: Ident,
    enum_generics: Generics,
    variants: Vec<AnnotatedVariant>,
}

fn parse(input: DeriveInput) -> Result<TerminalAnnotatedEnum, syn::Error> {
    let input_span = input.span();
    let enum_ident = input.ident;
    let enum_generics = input.generics;

    let enum_variants = match input.data {
        Data::Enum(DataEnum { variants, .. }) => variants,
        _ => {
            return Err(syn::Error::new(
                input_span,
                "derive macro only works on enums",
            ))
        }
    };

    if enum_variants.is_empty() {
        return Err(syn::Error::new(
            input_span,
            "derive macro requires at least one variant",
        ));
    }

    let variants = enum_variants
        .into_iter()
        .map(|variant| {
            let variant_span = variant.span();
            let mut attrs = variant
                .attrs
                .iter()
                .filter(|attr| attr.path().is_ident("terminal"));

            match (attrs.next(), attrs.next()) {
                (Some(attr), None) => attr
                    .parse_args_with(TerminalKind::parse)
                    .map(|kind| AnnotatedVariant {
                        ident: variant.ident.clone(),
                        kind,
                    }),
                (Some(_), Some(dup)) => Err(syn::Error::new(
                    dup.span(),
                    format!("variant({}) has more than one terminal attribute", &variant.ident),
                )),
                (None, _) => Err(syn::Error::new(
                    variant_span,
                    format!("variant({}) is missing a terminal attribute", &variant.ident),
                )),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TerminalAnnotatedEnum {
        enum_ident,
        enum_generics,
        variants,
    })
}

fn codegen(annotated_enum: &TerminalAnnotatedEnum) -> TokenStream {
    let enum_ident = &annotated_enum.enum_ident;
    let (impl_generics, ty_generics, where_clause) = annotated_enum.enum_generics.split_for_impl();

    let arms = annotated_enum.variants.iter().map(|variant| {
        let ident = &variant.ident;
        let terminal = match variant.kind {
            TerminalKind::Char(c) => quote!(::ll_core::grammar::Terminal::Char(#c)),
            TerminalKind::Eof => quote!(::ll_core::grammar::Terminal::Eof),
        };

        quote!(Self::#ident { .. } => #terminal,)
    });

    quote!(
        impl #impl_generics ::ll_core::TerminalRepresentable for #enum_ident #ty_generics #where_clause {
            fn to_terminal(&self) -> ::ll_core::grammar::Terminal {
                match self {
                    #(#arms)*
                }
            }
        }
    )
}

/// Derives `TerminalRepresentable` for a token enum where every variant
/// carries a `#[terminal('c')]` or `#[terminal(eof)]` attribute.
#[proc_macro_derive(Terminal, attributes(terminal))]
pub fn derive_terminal(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match parse(input) {
        Ok(annotated_enum) => codegen(&annotated_enum).into(),
        Err(e) => e.to_compile_error().into(),
    }
}

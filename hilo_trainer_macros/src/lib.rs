use proc_macro::TokenStream as TokenStream1;
use proc_macro2::TokenStream as TokenStream2;
use quote::{quote, ToTokens};
use syn::{parse::Parser, punctuated::Punctuated, Ident, Token};

/// This macro is added before a command method of the `Table` struct in the
/// impl block. Use this macro to first check if the current phase is one of
/// the phases in the attribute, and that no paced sequence is running.
///
/// For example, `#[allowed_phase(Idle, RoundOver)]` will make a method first
/// check if the current phase is `Idle` or `RoundOver`. If not, the method
/// logs the rejection and returns `Ok(Response::Ignored)` without touching
/// any state. The method must therefore return `Result<Response, _>`.
#[proc_macro_attribute]
pub fn allowed_phase(attr: TokenStream1, item: TokenStream1) -> TokenStream1 {
    let mut ast: syn::ImplItemFn = syn::parse(item).expect("allowed_phase goes on a method");
    let phases = Punctuated::<Ident, Token![,]>::parse_terminated
        .parse(attr)
        .expect("allowed_phase expects a list of Phase variants");
    if phases.is_empty() {
        panic!("allowed_phase needs at least one phase");
    }

    let command = ast.sig.ident.to_string();
    let phase_list = phases
        .iter()
        .map(|phase| phase.to_string())
        .collect::<Vec<_>>()
        .join(" or ");
    let patterns: Vec<TokenStream2> = phases.iter().map(|phase| quote! { Phase::#phase }).collect();

    let early_return: syn::Stmt = syn::parse_quote! {
        if self.busy || !matches!(self.phase, #(#patterns)|*) {
            ::tracing::debug!(
                command = #command,
                phase = ?self.phase,
                busy = self.busy,
                "command ignored, only allowed in {}",
                #phase_list
            );
            return Ok(Response::Ignored);
        }
    };
    ast.block.stmts.insert(0, early_return);
    ast.into_token_stream().into()
}

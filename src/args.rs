//! Compiler argument derivation from a build command string.

/// Check whether a command token names a source file with one of `extensions`.
pub fn is_source_file(token: &str, extensions: &[String]) -> bool {
    token
        .rsplit_once('.')
        .is_some_and(|(_, ext)| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// Derive the argument list to replay for a build command.
///
/// The command is split on whitespace; see [`derive_arguments_from_tokens`].
pub fn derive_arguments(command: &str, extensions: &[String]) -> Vec<String> {
    derive_arguments_from_tokens(command.split_whitespace(), extensions)
}

/// Derive the argument list from an already tokenized command line.
///
/// Leading `KEY=value` tokens are environment assignments and the first token
/// without `=` is the compiler itself; both are dropped. Source-file tokens are
/// dropped wherever they appear, everything else is kept in order.
pub fn derive_arguments_from_tokens<'a, I>(tokens: I, extensions: &[String]) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut had_compiler = false;
    let mut args = Vec::new();

    for token in tokens {
        if !had_compiler {
            if !token.contains('=') {
                had_compiler = true;
            }
            continue;
        }
        if !is_source_file(token, extensions) {
            args.push(token.to_string());
        }
    }

    args
}

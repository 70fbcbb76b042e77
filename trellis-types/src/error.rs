use miette::Diagnostic;
use thiserror::Error;

/// Failures at the type-token and literal layer.
#[derive(Debug, Error, Diagnostic)]
pub enum TypeError {
    #[error("invalid type: \"{token}\"")]
    #[diagnostic(
        code(trellis::types::unknown_type),
        help("valid tokens are scalar types (INT, FLOAT, STRING, BOOL) and column types (e.g. FLOAT_COLUMN), optionally joined with \"|\"")
    )]
    UnknownType { token: String },

    #[error("invalid type: \"{declared}\" repeats \"{token}\"")]
    #[diagnostic(code(trellis::types::duplicate_token))]
    DuplicateTypeToken { declared: String, token: String },

    #[error("invalid type: \"{declared}\" mixes scalar and column types")]
    #[diagnostic(
        code(trellis::types::mixed_families),
        help("a compound type must list only scalar types or only column types")
    )]
    MixedTypeFamilies { declared: String },

    #[error("cannot cast {value} to {target}")]
    #[diagnostic(code(trellis::types::cannot_cast))]
    CannotCastValue { value: String, target: String },

    #[error("invalid resource reference: \"@{raw}\"")]
    #[diagnostic(
        code(trellis::types::malformed_reference),
        help("a reference is \"@\" followed by a resource name of letters, digits, \"_\" or \"-\"")
    )]
    MalformedReference { raw: String },

    #[error("unsupported document node: {kind}")]
    #[diagnostic(code(trellis::types::unsupported_node))]
    UnsupportedNode { kind: String },

    #[error(transparent)]
    #[diagnostic(code(trellis::types::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

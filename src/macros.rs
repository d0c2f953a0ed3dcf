/// Builds `validator::ValidationErrors` out of field => [code => message] pairs.
#[macro_export]
macro_rules! validation_errors {
    ({$($field:tt: [$($code:tt => $value:tt),*]),*}) => {{
        let mut errors = ::validator::ValidationErrors::new();
        $(
            $(
                let error = ::validator::ValidationError {
                    code: $code.into(),
                    message: Some($value.into()),
                    params: ::std::collections::HashMap::new(),
                };
                errors.add($field, error);
            )*
        )*

        errors
    }};
}

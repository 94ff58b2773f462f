//! Helper macros for generating domain port error enums.
//!
//! Every variant gets a snake_case constructor whose fields accept
//! `impl Into<T>`, so adapters can write `UserRepositoryError::query(msg)`.
//! Enums declared with `: persistence` start with the `Connection` and
//! `Query` variants shared by all database adapters.

macro_rules! define_port_error {
    (@ctor $variant:ident) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]() -> Self {
                Self::$variant
            }
        }
    };

    (@ctor $variant:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        define_port_error!(@ctor_impl $variant () () $( $field : $ty, )*);
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) ) => {
        ::paste::paste! {
            pub fn [<$variant:snake>]($($params)*) -> Self {
                Self::$variant { $($inits)* }
            }
        }
    };

    (@ctor_impl $variant:ident ($($params:tt)*) ($($inits:tt)*) $field:ident : $ty:ty, $($rest:tt)*) => {
        define_port_error!(
            @ctor_impl
            $variant
            ($($params)* $field: impl Into<$ty>,)
            ($($inits)* $field: $field.into(),)
            $($rest)*
        );
    };

    (
        $(#[$outer:meta])*
        pub enum $name:ident : persistence {
            $($rest:tt)*
        }
    ) => {
        define_port_error! {
            $(#[$outer])*
            pub enum $name {
                /// Repository connection could not be established.
                Connection { message: String } => "repository connection failed: {message}",
                /// Query or mutation failed during execution.
                Query { message: String } => "repository query failed: {message}",
                $($rest)*
            }
        }
    };

    (
        $(#[$outer:meta])*
        pub enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $( { $($field:ident : $ty:ty),* $(,)? } )? => $message:expr
            ),* $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$variant_meta])*
                #[error($message)]
                $variant $( { $($field : $ty),* } )?,
            )*
        }

        impl $name {
            $(
                define_port_error!(@ctor $variant $( { $($field : $ty),* } )?);
            )*
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use uuid::Uuid;

    define_port_error! {
        pub enum GatewayError {
            Timeout => "gateway timed out",
            Rejected { status: u16, body: String } => "gateway rejected request ({status}): {body}",
        }
    }

    define_port_error! {
        pub enum LedgerError: persistence {
            Missing { id: Uuid } => "ledger row {id} not found",
        }
    }

    #[test]
    fn unit_variants_get_constructors() {
        assert_eq!(GatewayError::timeout().to_string(), "gateway timed out");
    }

    #[test]
    fn constructors_convert_each_field() {
        let err = GatewayError::rejected(502_u16, "bad gateway");
        assert_eq!(err.to_string(), "gateway rejected request (502): bad gateway");
    }

    #[test]
    fn persistence_enums_carry_shared_variants() {
        assert_eq!(
            LedgerError::connection("refused").to_string(),
            "repository connection failed: refused"
        );
        assert_eq!(
            LedgerError::query("syntax").to_string(),
            "repository query failed: syntax"
        );
        let id = Uuid::nil();
        assert_eq!(
            LedgerError::missing(id).to_string(),
            format!("ledger row {id} not found")
        );
    }
}

/// Generates a fieldless enum with a stable lowercase name per variant.
///
/// Produces: enum definition + `as_str()` + `Display` + `AsRef<str>`.
///
/// # Example
///
/// ```ignore
/// define_named_enum! {
///     /// Doc comment for the enum.
///     pub enum MyEnum {
///         Foo => "foo",
///         Bar => "bar",
///     }
/// }
/// ```
macro_rules! define_named_enum {
    (
        $(#[$enum_meta:meta])*
        $vis:vis enum $Name:ident {
            $(
                $(#[$var_meta:meta])*
                $variant:ident => $name:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $Name {
            $(
                $(#[$var_meta])*
                $variant,
            )+
        }

        impl $Name {
            /// Stable name used in logs and reports.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $Name::$variant => $name, )+
                }
            }
        }

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl AsRef<str> for $Name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }
    };
}

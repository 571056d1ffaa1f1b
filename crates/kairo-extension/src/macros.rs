//! Convenience macros for contributor and host code.

/// Builds a built-in plugin [`Manifest`](crate::manifest::Manifest).
///
/// # Example
/// ```rust,ignore
/// let manifest = manifest!(
///     id: "daily-notes",
///     name: "Daily Notes",
///     version: "1.0.0",
///     description: "Opens today's note"
/// );
/// ```
#[macro_export]
macro_rules! manifest {
    (
        id: $id:expr,
        name: $name:expr,
        version: $version:expr
    ) => {
        $crate::manifest::Manifest::builtin($id, $name, $version)
    };
    (
        id: $id:expr,
        name: $name:expr,
        version: $version:expr,
        description: $desc:expr
    ) => {
        $crate::manifest::Manifest::builtin($id, $name, $version).with_description($desc)
    };
}

/// Exports the entry point of a natively loaded extension.
///
/// The constructor must return a type implementing
/// [`ExtensionModule`](crate::loader::ExtensionModule). The extension crate
/// is built as a `cdylib` with the same toolchain as the host.
///
/// # Example
/// ```rust,ignore
/// kairo_extension::declare_extension!(WordCount::new);
/// ```
#[macro_export]
macro_rules! declare_extension {
    ($constructor:path) => {
        #[unsafe(no_mangle)]
        pub fn kairo_extension_entry() -> ::std::boxed::Box<dyn $crate::loader::ExtensionModule> {
            ::std::boxed::Box::new($constructor())
        }
    };
}

/// Declares a string-named contribution point enum with a `Custom` variant.
macro_rules! named_points {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal, )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant, )*
            /// A point named by the host or a contributor at runtime.
            Custom(String),
        }

        impl $name {
            /// Returns the wire name of this point.
            pub fn as_str(&self) -> &str {
                match self {
                    $( Self::$variant => $text, )*
                    Self::Custom(name) => name.as_str(),
                }
            }

            /// Returns every predefined point, excluding `Custom`.
            pub fn known() -> Vec<Self> {
                vec![$( Self::$variant ),*]
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                match name {
                    $( $text => Self::$variant, )*
                    other => Self::Custom(other.to_string()),
                }
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = ::std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self::from(s))
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let name = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                Ok(Self::from(name.as_str()))
            }
        }
    };
}

pub(crate) use named_points;

//! Canonical cache keys derived from a call's receiver type and arguments
//!
//! A key only ever depends on the *type* of the receiver, never on its
//! state, so two instances of the same client share entries for the same
//! logical call. Argument values are quoted and escaped, while arguments
//! that are better identified by their type (live connections, HTTP
//! clients) render as their type name.

use std::{borrow::Cow, fmt, path::Path, sync::Arc};

use aliri_braid::braid;

/// A canonical string identifying a cacheable call or token scope
#[braid(serde)]
pub struct CacheKey;

/// Renders a value into its cache key fragment
pub trait KeyArg {
    /// Appends this value's key fragment to `out`
    fn write_fragment(&self, out: &mut String);
}

/// Appends `value` wrapped as `('value')`, escaping `\` and `'`
fn write_quoted(out: &mut String, value: &str) {
    out.push_str("('");
    for c in value.chars() {
        if c == '\\' || c == '\'' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push_str("')");
}

macro_rules! key_arg_by_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl KeyArg for $ty {
                #[inline]
                fn write_fragment(&self, out: &mut String) {
                    write_quoted(out, &self.to_string());
                }
            }
        )*
    };
}

key_arg_by_display!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
);

impl KeyArg for str {
    #[inline]
    fn write_fragment(&self, out: &mut String) {
        write_quoted(out, self);
    }
}

impl KeyArg for String {
    #[inline]
    fn write_fragment(&self, out: &mut String) {
        write_quoted(out, self);
    }
}

impl KeyArg for Cow<'_, str> {
    #[inline]
    fn write_fragment(&self, out: &mut String) {
        write_quoted(out, self);
    }
}

impl KeyArg for Path {
    fn write_fragment(&self, out: &mut String) {
        write_quoted(out, &self.to_string_lossy());
    }
}

impl KeyArg for CacheKeyRef {
    #[inline]
    fn write_fragment(&self, out: &mut String) {
        write_quoted(out, self.as_str());
    }
}

impl<T: KeyArg + ?Sized> KeyArg for &T {
    #[inline]
    fn write_fragment(&self, out: &mut String) {
        (**self).write_fragment(out)
    }
}

impl<T: KeyArg + ?Sized> KeyArg for Box<T> {
    #[inline]
    fn write_fragment(&self, out: &mut String) {
        (**self).write_fragment(out)
    }
}

impl<T: KeyArg + ?Sized> KeyArg for Arc<T> {
    #[inline]
    fn write_fragment(&self, out: &mut String) {
        (**self).write_fragment(out)
    }
}

impl<T: KeyArg> KeyArg for Option<T> {
    fn write_fragment(&self, out: &mut String) {
        match self {
            Some(v) => {
                out.push_str("Some");
                v.write_fragment(out);
            }
            None => out.push_str("None"),
        }
    }
}

impl<T: KeyArg> KeyArg for [T] {
    fn write_fragment(&self, out: &mut String) {
        out.push('[');
        for (idx, v) in self.iter().enumerate() {
            if idx > 0 {
                out.push(',');
            }
            v.write_fragment(out);
        }
        out.push(']');
    }
}

impl<T: KeyArg> KeyArg for Vec<T> {
    #[inline]
    fn write_fragment(&self, out: &mut String) {
        self.as_slice().write_fragment(out)
    }
}

/// Marks types whose cache key fragment is their type name rather than
/// their value
///
/// Use this for handles whose representation is large or unstable, such
/// as connection pools or HTTP clients.
///
/// ```
/// struct Connection;
/// ampyr_cache::key_arg_by_type!(Connection);
/// ```
#[macro_export]
macro_rules! key_arg_by_type {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::KeyArg for $ty {
                #[inline]
                fn write_fragment(&self, out: &mut ::std::string::String) {
                    out.push_str(::std::any::type_name::<$ty>());
                }
            }
        )*
    };
}

/// Builds a [`CacheKey`] of the form `<Type=method-name:('value')-...>`
#[derive(Clone)]
pub struct KeyBuilder {
    tag: Cow<'static, str>,
    method: Option<Cow<'static, str>>,
    args: Vec<String>,
}

impl KeyBuilder {
    /// Starts a key with an explicit type tag
    pub fn new(tag: impl Into<Cow<'static, str>>) -> Self {
        Self {
            tag: tag.into(),
            method: None,
            args: Vec::new(),
        }
    }

    /// Starts a key tagged with the name of `T`
    pub fn for_type<T: ?Sized>() -> Self {
        Self::new(std::any::type_name::<T>())
    }

    /// Starts a key tagged with the type of `receiver`
    ///
    /// Only the type is used; the receiver's state never influences the key.
    pub fn for_receiver<T: ?Sized>(_receiver: &T) -> Self {
        Self::for_type::<T>()
    }

    /// Sets the method name
    pub fn method(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.method = Some(name.into());
        self
    }

    /// Appends a named argument
    pub fn arg<V: KeyArg + ?Sized>(mut self, name: &str, value: &V) -> Self {
        let mut fragment = String::with_capacity(name.len() + 8);
        fragment.push_str(name);
        fragment.push(':');
        value.write_fragment(&mut fragment);
        self.args.push(fragment);
        self
    }

    /// Appends a named argument that is identified only by the type `T`
    pub fn type_arg<T: ?Sized>(mut self, name: &str) -> Self {
        self.args
            .push(format!("{}:{}", name, std::any::type_name::<T>()));
        self
    }

    /// Appends a named argument using its `Debug` form
    ///
    /// Fallback for values that have no [`KeyArg`] implementation.
    pub fn debug_arg<V: fmt::Debug + ?Sized>(self, name: &str, value: &V) -> Self {
        let rendered = format!("{:?}", value);
        self.arg(name, rendered.as_str())
    }

    /// Renders the key
    pub fn build(&self) -> CacheKey {
        let mut key = String::with_capacity(
            self.tag.len() + self.args.iter().map(|a| a.len() + 1).sum::<usize>() + 16,
        );
        key.push('<');
        key.push_str(&self.tag);
        key.push('=');

        let mut first = true;
        let parts = self
            .method
            .iter()
            .map(|m| &**m)
            .chain(self.args.iter().map(String::as_str));
        for part in parts {
            if !first {
                key.push('-');
            }
            first = false;
            key.push_str(part);
        }

        key.push('>');
        CacheKey::new(key)
    }
}

impl fmt::Debug for KeyBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("KeyBuilder").field(&self.build()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Client {
        #[allow(dead_code)]
        session: u32,
    }

    struct Connection;
    crate::key_arg_by_type!(Connection);

    #[test]
    fn renders_human_readable_key() {
        let key = KeyBuilder::new("Client")
            .method("fetch")
            .arg("id", &7_u32)
            .arg("name", "album")
            .build();

        assert_eq!(key.as_str(), "<Client=fetch-id:('7')-name:('album')>");
    }

    #[test]
    fn equal_inputs_produce_equal_keys() {
        let build = || {
            KeyBuilder::for_type::<Client>()
                .method("search")
                .arg("query", "rust")
                .arg("limit", &Some(10_u8))
                .build()
        };

        assert_eq!(build(), build());
    }

    #[test]
    fn differing_arguments_produce_differing_keys() {
        let a = KeyBuilder::new("C").method("m").arg("x", &1_i32).build();
        let b = KeyBuilder::new("C").method("m").arg("x", &2_i32).build();
        let c = KeyBuilder::new("C").method("n").arg("x", &1_i32).build();
        let d = KeyBuilder::new("D").method("m").arg("x", &1_i32).build();

        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn receiver_state_does_not_affect_key() {
        let first = Client { session: 1 };
        let second = Client { session: 2 };

        let a = KeyBuilder::for_receiver(&first).method("get").build();
        let b = KeyBuilder::for_receiver(&second).method("get").build();

        assert_eq!(a, b);
        assert!(a.as_str().contains("Client"));
    }

    #[test]
    fn quoting_prevents_delimiter_collisions() {
        let joined = KeyBuilder::new("C").arg("a", "x')-a:('y").build();
        let split = KeyBuilder::new("C").arg("a", "x").arg("a", "y").build();

        assert_ne!(joined, split);
        assert_eq!(joined.as_str(), r"<C=a:('x\')-a:(\'y')>");
    }

    #[test]
    fn none_differs_from_the_string_none() {
        let none = KeyBuilder::new("C").arg("v", &Option::<String>::None).build();
        let some = KeyBuilder::new("C").arg("v", &Some("None".to_owned())).build();

        assert_ne!(none, some);
    }

    #[test]
    fn nested_options_stay_distinct() {
        let outer = KeyBuilder::new("C").arg("v", &Option::<Option<u8>>::None).build();
        let inner = KeyBuilder::new("C").arg("v", &Some(Option::<u8>::None)).build();
        let value = KeyBuilder::new("C").arg("v", &Some(Some(4_u8))).build();

        assert_ne!(outer, inner);
        assert_eq!(outer.as_str(), "<C=v:None>");
        assert_eq!(inner.as_str(), "<C=v:SomeNone>");
        assert_eq!(value.as_str(), "<C=v:SomeSome('4')>");
    }

    #[test]
    fn typed_arguments_render_type_name() {
        let key = KeyBuilder::new("C").arg("conn", &Connection).build();
        let same = KeyBuilder::new("C").type_arg::<Connection>("conn").build();

        assert_eq!(key, same);
        assert!(key.as_str().ends_with("Connection>"));
    }

    #[test]
    fn debug_fallback_is_quoted() {
        #[derive(Debug)]
        struct Opaque(u8);

        let key = KeyBuilder::new("C").debug_arg("o", &Opaque(3)).build();
        assert_eq!(key.as_str(), "<C=o:('Opaque(3)')>");
    }

    #[test]
    fn sequences_render_in_order() {
        let a = KeyBuilder::new("C").arg("ids", &vec![1, 2, 3]).build();
        let b = KeyBuilder::new("C").arg("ids", &vec![3, 2, 1]).build();

        assert_ne!(a, b);
        assert_eq!(a.as_str(), "<C=ids:[('1'),('2'),('3')]>");
    }

    #[test]
    fn empty_key_has_only_tag() {
        assert_eq!(KeyBuilder::new("Solo").build().as_str(), "<Solo=>");
    }
}

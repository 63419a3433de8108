//! Shallow merging of partial updates into state.
//!
//! A state type declares its mergeable shape once by implementing [`Merge`].
//! The [`Partial`](Merge::Partial) type carries only the fields an update
//! touches; merging copies every other field from the base value. Nested
//! values are replaced wholesale, never merged recursively.
//!
//! Most state structs get their impl from [`store_state!`](crate::store_state),
//! which also generates the partial type:
//!
//! ```
//! use specks::{store_state, Merge};
//!
//! store_state! {
//!     #[derive(Clone, Debug, PartialEq)]
//!     pub struct Profile => ProfilePatch {
//!         pub name: String,
//!         pub age: u32,
//!     }
//! }
//!
//! let base = Profile { name: "ada".into(), age: 36 };
//! let next = base.merge(ProfilePatch::new().age(37));
//! assert_eq!(next, Profile { name: "ada".into(), age: 37 });
//! ```

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// State that can absorb a partial update.
pub trait Merge {
    /// The update shape: every field optional.
    type Partial: Default;

    /// Build a new value from `self` with the fields present in `partial`
    /// overwritten.
    fn merge(&self, partial: Self::Partial) -> Self;
}

impl<K, V> Merge for HashMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    type Partial = HashMap<K, V>;

    fn merge(&self, partial: Self::Partial) -> Self {
        let mut next = self.clone();
        next.extend(partial);
        next
    }
}

impl<K, V> Merge for BTreeMap<K, V>
where
    K: Ord + Clone,
    V: Clone,
{
    type Partial = BTreeMap<K, V>;

    fn merge(&self, partial: Self::Partial) -> Self {
        let mut next = self.clone();
        next.extend(partial);
        next
    }
}

/// Declare a state struct together with its partial update type.
///
/// The partial type has one `Option` field per state field and a chainable
/// setter named after each field. Every state field type must be `Clone`,
/// since unchanged fields are copied into the merged value.
///
/// ```
/// use std::rc::Rc;
/// use specks::store_state;
///
/// store_state! {
///     #[derive(Clone)]
///     pub struct Counter => CounterPatch {
///         pub count: i64,
///         pub add: Rc<dyn Fn(i64)>,
///     }
/// }
///
/// let patch = CounterPatch::new().count(3);
/// assert_eq!(patch.count, Some(3));
/// assert!(patch.add.is_none());
/// ```
#[macro_export]
macro_rules! store_state {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident => $partial:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        #[doc = concat!("Partial update for [`", stringify!($name), "`].")]
        #[derive(Default)]
        $vis struct $partial {
            $(
                $field_vis $field: ::core::option::Option<$ty>,
            )*
        }

        impl $partial {
            /// An update that touches no field.
            #[allow(dead_code)]
            $vis fn new() -> Self {
                ::core::default::Default::default()
            }

            $(
                #[allow(dead_code)]
                $field_vis fn $field(mut self, value: $ty) -> Self {
                    self.$field = ::core::option::Option::Some(value);
                    self
                }
            )*
        }

        impl $crate::Merge for $name {
            type Partial = $partial;

            fn merge(&self, partial: Self::Partial) -> Self {
                Self {
                    $(
                        $field: match partial.$field {
                            ::core::option::Option::Some(value) => value,
                            ::core::option::Option::None => {
                                ::core::clone::Clone::clone(&self.$field)
                            }
                        },
                    )*
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    store_state! {
        #[derive(Clone, Debug, PartialEq)]
        struct Settings => SettingsPatch {
            theme: String,
            font_size: u8,
            recent: Rc<Vec<String>>,
        }
    }

    fn settings() -> Settings {
        Settings {
            theme: "dark".to_string(),
            font_size: 12,
            recent: Rc::new(vec!["a.txt".to_string()]),
        }
    }

    #[test]
    fn merge_overwrites_present_fields_only() {
        let base = settings();
        let next = base.merge(SettingsPatch::new().font_size(14));

        assert_eq!(next.font_size, 14);
        assert_eq!(next.theme, "dark");
        assert!(Rc::ptr_eq(&next.recent, &base.recent));
    }

    #[test]
    fn empty_partial_copies_everything() {
        let base = settings();
        assert_eq!(base.merge(SettingsPatch::default()), base);
    }

    #[test]
    fn nested_values_are_replaced_wholesale() {
        let base = settings();
        let next = base.merge(SettingsPatch::new().recent(Rc::new(vec!["b.txt".to_string()])));

        assert_eq!(*next.recent, vec!["b.txt".to_string()]);
        assert_eq!(*base.recent, vec!["a.txt".to_string()]);
    }

    #[test]
    fn map_merge_is_key_wise() {
        let base = HashMap::from([("hello", "world"), ("count", "1")]);
        let next = base.merge(HashMap::from([("hello", "mars")]));

        assert_eq!(next.get("hello"), Some(&"mars"));
        assert_eq!(next.get("count"), Some(&"1"));
        assert_eq!(base.get("hello"), Some(&"world"));
    }

    #[test]
    fn btree_merge_adds_new_keys() {
        let base = BTreeMap::from([(1, 'a')]);
        let next = base.merge(BTreeMap::from([(2, 'b')]));
        assert_eq!(next.into_iter().collect::<Vec<_>>(), vec![(1, 'a'), (2, 'b')]);
    }
}

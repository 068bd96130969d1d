//! Schema-driven population of typed records from one object level.
//!
//! A destination type describes its fields once through [`Extract`], usually
//! generated with [`extract_fields!`](crate::extract_fields). The walker then
//! matches each key it meets against that table and assigns the value
//! according to the field's declared type.

use std::io::{Read, Seek};

use crate::error::{ChartError, Result};

use super::{
    token::{Token, TokenKind},
    walker::Walker,
};

/// A mutable view of one destination field, tagged with its type.
pub enum Slot<'a> {
    /// A string field. Numbers are stored as their source text.
    Str(&'a mut String),
    /// A single precision float field.
    F32(&'a mut f32),
    /// A double precision float field.
    F64(&'a mut f64),
    /// A signed integer field.
    I32(&'a mut i32),
    /// A wide signed integer field.
    I64(&'a mut i64),
    /// An unsigned integer field.
    U32(&'a mut u32),
    /// A flag. Numbers are accepted as non-zero means `true`.
    Bool(&'a mut bool),
    /// A nested record, populated recursively.
    Object(&'a mut dyn Extract),
}

/// A record that can be populated by [`Walker::extract_object`].
pub trait Extract {
    /// Returns the destination slot for `key`, or `None` if the key is not part of the schema.
    fn slot(&mut self, key: &str) -> Option<Slot<'_>>;
}

/// Implements [`Extract`] from a static key to field table.
///
/// ```
/// # use judgeline::extract_fields;
/// #[derive(Default)]
/// struct Bpm {
///     bpm: f32,
///     label: String,
/// }
///
/// extract_fields!(Bpm {
///     "bpm" => bpm: F32,
///     "label" => label: Str,
/// });
///
/// let mut walker = judgeline::json::Walker::from_bytes(br#"{"bpm": 128.5, "label": "intro"}"#).unwrap();
/// let mut bpm = Bpm::default();
/// walker.extract_object(&mut bpm).unwrap();
/// assert_eq!(bpm.label, "intro");
/// ```
#[macro_export]
macro_rules! extract_fields {
    ($ty:ty { $($key:literal => $field:ident : $kind:ident),* $(,)? }) => {
        impl $crate::json::Extract for $ty {
            fn slot(&mut self, key: &str) -> Option<$crate::json::Slot<'_>> {
                match key {
                    $($key => Some($crate::json::Slot::$kind(&mut self.$field)),)*
                    _ => None,
                }
            }
        }
    };
}

pub(crate) fn parse_integer<T>(token: &Token) -> Result<T>
where
    T: std::str::FromStr + TryFrom<i64>,
{
    if let Ok(value) = token.parse_number::<T>() {
        return Ok(value);
    }
    let invalid = || ChartError::InvalidNumber {
        text: token.kind.describe(),
        offset: token.offset,
    };
    let float: f64 = token.parse_number()?;
    if float.fract() != 0.0 || !float.is_finite() {
        return Err(invalid());
    }
    T::try_from(float as i64).map_err(|_| invalid())
}

fn assign<R: Read + Seek>(
    slot: Slot<'_>,
    key: &str,
    value: &Token,
    walker: &mut Walker<R>,
) -> Result<()> {
    match (slot, &value.kind) {
        (_, TokenKind::LeftBracket) => Err(ChartError::UnsupportedFeature {
            feature: format!("array-typed field `{key}`"),
            offset: value.offset,
        }),
        (Slot::Object(target), TokenKind::LeftBrace) => walker.extract_object(target),
        (_, TokenKind::LeftBrace) => Err(walker.structural("scalar value")),
        (_, TokenKind::Null) => Ok(()),
        (Slot::Str(dest), TokenKind::String(text) | TokenKind::Number(text)) => {
            dest.clone_from(text);
            Ok(())
        }
        (Slot::F32(dest), TokenKind::Number(_)) => {
            *dest = value.parse_number()?;
            Ok(())
        }
        (Slot::F64(dest), TokenKind::Number(_)) => {
            *dest = value.parse_number()?;
            Ok(())
        }
        (Slot::I32(dest), TokenKind::Number(_)) => {
            *dest = parse_integer(value)?;
            Ok(())
        }
        (Slot::I64(dest), TokenKind::Number(_)) => {
            *dest = parse_integer(value)?;
            Ok(())
        }
        (Slot::U32(dest), TokenKind::Number(_)) => {
            *dest = parse_integer(value)?;
            Ok(())
        }
        (Slot::Bool(dest), TokenKind::Bool(flag)) => {
            *dest = *flag;
            Ok(())
        }
        (Slot::Bool(dest), TokenKind::Number(_)) => {
            *dest = value.parse_number::<f64>()? != 0.0;
            Ok(())
        }
        (_, other) => Err(ChartError::Structural {
            expected: "value matching the field type",
            found: other.describe(),
            offset: value.offset,
        }),
    }
}

impl<R: Read + Seek> Walker<R> {
    /// Populates `target` from the object under (or around) the cursor.
    ///
    /// Unknown keys are skipped. Array values of schema fields are rejected.
    ///
    /// # Errors
    ///
    /// - [`ChartError::UnsupportedFeature`] when a schema field holds an array.
    /// - [`ChartError::InvalidNumber`] when a number does not fit its field.
    /// - Any structural error of the underlying object.
    pub fn extract_object<T: Extract + ?Sized>(&mut self, target: &mut T) -> Result<()> {
        self.extract_object_with(target, &[], |_, _, _, _| Ok(()))
    }

    /// Like [`Walker::extract_object`], but keys listed in `blacklist` are handed
    /// to `on_blacklisted` instead of being assigned.
    ///
    /// The callback receives the value token. A scalar value has already been
    /// consumed; for a structural value the walker still rests on its opening
    /// bracket, and whatever the callback leaves unread is skipped.
    ///
    /// # Errors
    ///
    /// See [`Walker::extract_object`]. Errors of the callback are propagated.
    pub fn extract_object_with<T, F>(
        &mut self,
        target: &mut T,
        blacklist: &[&str],
        mut on_blacklisted: F,
    ) -> Result<()>
    where
        T: Extract + ?Sized,
        F: FnMut(&mut T, &str, &Token, &mut Self) -> Result<()>,
    {
        let mut props = self.read_properties()?;
        while let Some((key, value)) = props.next_property()? {
            let Some(key) = key.as_str() else {
                continue;
            };
            if blacklist.contains(&key) {
                on_blacklisted(target, key, &value, props.walker())?;
            } else if let Some(slot) = target.slot(key) {
                assign(slot, key, &value, props.walker())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Meta {
        name: String,
        offset: i32,
    }

    #[derive(Debug, Default, PartialEq)]
    struct Record {
        bpm: f32,
        count: u32,
        fake: bool,
        meta: Meta,
        start: Vec<i32>,
    }

    extract_fields!(Meta {
        "name" => name: Str,
        "offset" => offset: I32,
    });

    extract_fields!(Record {
        "bpm" => bpm: F32,
        "count" => count: U32,
        "isFake" => fake: Bool,
        "meta" => meta: Object,
    });

    #[test]
    fn populates_nested_fields_and_skips_unknown_keys() {
        let src = br#"{"bpm":172.5,"unused":{"x":[1,2]},"count":3.0,"isFake":1,"meta":{"name":"Demo","offset":-40}}"#;
        let mut walker = Walker::from_bytes(src).expect("lex");
        let mut record = Record::default();
        walker.extract_object(&mut record).expect("extract");
        assert_eq!(
            record,
            Record {
                bpm: 172.5,
                count: 3,
                fake: true,
                meta: Meta {
                    name: "Demo".into(),
                    offset: -40,
                },
                start: vec![],
            }
        );
    }

    #[test]
    fn array_field_is_rejected() {
        let mut walker = Walker::from_bytes(br#"{"bpm":[1,2]}"#).expect("lex");
        let mut record = Record::default();
        let err = walker.extract_object(&mut record).expect_err("array");
        assert!(matches!(err, ChartError::UnsupportedFeature { offset: 7, .. }));
    }

    #[test]
    fn fractional_integer_is_rejected() {
        let mut walker = Walker::from_bytes(br#"{"count":2.5}"#).expect("lex");
        let mut record = Record::default();
        assert!(matches!(
            walker.extract_object(&mut record),
            Err(ChartError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn blacklisted_keys_go_through_the_callback() {
        let src = br#"{"start":[4,1,2],"bpm":90,"count":7}"#;
        let mut walker = Walker::from_bytes(src).expect("lex");
        let mut record = Record::default();
        walker
            .extract_object_with(&mut record, &["start", "count"], |record, key, value, walker| {
                match key {
                    "start" => {
                        for token in walker.read_elements()? {
                            record.start.push(token?.parse_number()?);
                        }
                    }
                    "count" => record.count = value.parse_number::<u32>()? * 2,
                    _ => unreachable!(),
                }
                Ok(())
            })
            .expect("extract");
        assert_eq!(record.start, vec![4, 1, 2]);
        assert_eq!(record.bpm, 90.0);
        assert_eq!(record.count, 14);
    }
}

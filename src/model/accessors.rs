/// Generates a typed accessor trait for declared properties and implements
/// it for [`Record`](crate::model::Record).
///
/// Each `name: Type` entry produces `name()`, `set_name()` and `has_name()`.
/// Reads go through [`Record::get`](crate::model::Record::get), so a record
/// whose schema lacks the property fails with `NoSuchProperty`.
///
/// ```ignore
/// propbag::accessors! {
///     pub trait PoetProperties {
///         poem: String,
///         verses: i64,
///     }
/// }
///
/// record.set_poem("Ode")?;
/// assert_eq!(record.poem()?, Some("Ode".to_string()));
/// ```
#[macro_export]
macro_rules! accessors {
    ($vis:vis trait $name:ident { $($prop:ident : $ty:ty),* $(,)? }) => {
        $crate::__paste::paste! {
            $vis trait $name {
                $(
                    fn $prop(&self) -> $crate::error::Result<Option<$ty>>;
                    fn [<set_ $prop>](
                        &mut self,
                        value: impl Into<$crate::types::Value>,
                    ) -> $crate::error::Result<()>;
                    fn [<has_ $prop>](&self) -> $crate::error::Result<bool>;
                )*
            }

            impl $name for $crate::model::Record {
                $(
                    fn $prop(&self) -> $crate::error::Result<Option<$ty>> {
                        let value = self.get(stringify!($prop))?;
                        Ok(<$ty as $crate::types::FromValue>::from_value(&value))
                    }

                    fn [<set_ $prop>](
                        &mut self,
                        value: impl Into<$crate::types::Value>,
                    ) -> $crate::error::Result<()> {
                        self.set(stringify!($prop), value)
                    }

                    fn [<has_ $prop>](&self) -> $crate::error::Result<bool> {
                        self.has(stringify!($prop))
                    }
                )*
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::model::Model;
    use crate::schema::{ColumnOptions, Role};

    crate::accessors! {
        trait PoetProperties {
            poem: String,
            verses: i64,
        }
    }

    #[test]
    fn test_generated_accessors() {
        let model = Model::builder("Employee").build();
        let poet = Role::new("Poet");
        poet.string("poem", ColumnOptions::new()).unwrap();
        poet.integer("verses", ColumnOptions::new().default(3)).unwrap();
        model.include_role(&poet).unwrap();

        let mut record = model.new_record();
        assert_eq!(record.poem().unwrap(), None);
        assert!(!record.has_poem().unwrap());

        record.set_poem("Ode").unwrap();
        record.set_verses("12").unwrap();
        assert_eq!(record.poem().unwrap(), Some("Ode".to_string()));
        assert_eq!(record.verses().unwrap(), Some(12));
        assert!(record.has_poem().unwrap());

        record.set_verses("").unwrap();
        assert_eq!(record.verses().unwrap(), Some(3));
    }

    #[test]
    fn test_accessors_require_declared_property() {
        let model = Model::builder("Employee").build();
        let record = model.new_record();
        assert!(matches!(record.poem(), Err(Error::NoSuchProperty(_))));
    }
}

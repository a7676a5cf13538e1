use crate::repository::{Field, FieldKind, FieldValues, Record, RepoError, Value};

/// Expense category. `parent` references another category without owning it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Category {
    pub(crate) pk: i64,
    pub(crate) name: String,
    pub(crate) parent: Option<i64>,
}

impl Category {
    pub(crate) fn new(name: String, parent: Option<i64>) -> Self {
        Self {
            pk: 0,
            name,
            parent,
        }
    }

    /// Find a category by name (case-insensitive) in a slice.
    pub(crate) fn find_by_name<'a>(categories: &'a [Category], name: &str) -> Option<&'a Category> {
        let lower = name.trim().to_lowercase();
        categories.iter().find(|c| c.name.to_lowercase() == lower)
    }

    /// Find a category by pk in a slice.
    pub(crate) fn find_by_pk(categories: &[Category], pk: i64) -> Option<&Category> {
        categories.iter().find(|c| c.pk == pk)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Record for Category {
    const NAME: &'static str = "Category";

    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[
            Field::new("name", FieldKind::Text),
            Field::nullable("parent", FieldKind::Integer),
        ];
        FIELDS
    }

    fn pk(&self) -> i64 {
        self.pk
    }

    fn set_pk(&mut self, pk: i64) {
        self.pk = pk;
    }

    fn values(&self) -> Vec<Value> {
        vec![self.name.clone().into(), self.parent.into()]
    }

    fn from_fields(mut fields: FieldValues) -> Result<Self, RepoError> {
        Ok(Self {
            pk: 0,
            name: fields.text("name")?,
            parent: fields.optional_integer("parent")?,
        })
    }
}

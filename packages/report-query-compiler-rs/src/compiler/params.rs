/// Issues placeholder names for one compilation.
///
/// The counter is shared by every prefix, so `p_1` and `part_EMP_2` can never
/// collide even when they come from different derived sources.
#[derive(Debug, Default)]
pub struct ParamGenerator {
    counter: usize,
    values: BTreeMap<String, BindValue>,
}

impl ParamGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `(name, placeholder)` without binding anything.
    pub fn next(&mut self, prefix: &str) -> (String, String) {
        self.counter += 1;
        let name = format!("{prefix}_{}", self.counter);
        let placeholder = format!(":{name}");
        (name, placeholder)
    }

    pub fn bind(&mut self, prefix: &str, value: impl Into<BindValue>) -> String {
        let (name, placeholder) = self.next(prefix);
        self.values.insert(name, value.into());
        placeholder
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_params(self) -> BTreeMap<String, BindValue> {
        self.values
    }
}

/// 有序的元数据表
///
/// 保持插入顺序；覆盖已有的键时保留原来的位置。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// 设置键值，已存在则覆盖
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    /// 在已有的值后面追加内容（续行），键不存在时等同于 `insert`
    pub fn extend_value(&mut self, key: &str, more: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => v.push_str(more),
            None => self.entries.push((key.to_string(), more.to_string())),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = Metadata::new();
        for (k, v) in iter {
            metadata.insert(k, v);
        }
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_position_on_overwrite() {
        let mut metadata = Metadata::new();
        metadata.insert("course", "Algebra");
        metadata.insert("date", "today");
        metadata.insert("course", "Geometry");

        let keys: Vec<_> = metadata.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["course", "date"]);
        assert_eq!(metadata.get("course"), Some("Geometry"));
    }

    #[test]
    fn test_extend_value_concatenates_in_order() {
        let mut metadata = Metadata::new();
        metadata.insert("title", "a");
        metadata.extend_value("title", "b");
        metadata.extend_value("title", "c");
        assert_eq!(metadata.get("title"), Some("abc"));

        metadata.extend_value("fresh", "x");
        assert_eq!(metadata.get("fresh"), Some("x"));
    }
}

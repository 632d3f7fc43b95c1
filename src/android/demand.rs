/// The attribute names a caller wants pulled out of the manifest.
///
/// Names are matched by exact string equality: no namespace prefix, no case folding.
/// The set borrows the caller's slice for the duration of one extraction.
#[derive(Clone, Copy, Debug)]
pub struct DemandSet<'a, S: AsRef<str>> {
    names: &'a [S],
}

impl<'a, S: AsRef<str>> DemandSet<'a, S> {
    pub fn new(names: &'a [S]) -> Self {
        DemandSet { names }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|demand| demand.as_ref() == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a str> {
        self.names.iter().map(|name| name.as_ref())
    }
}

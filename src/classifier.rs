/// Decides which file names are uploadable media.
///
/// Matching is exact and case-sensitive: `.JPG` and `.jpg` are distinct
/// entries and both must be listed to accept both.
#[derive(Debug, Clone)]
pub struct FileClassifier {
    allowed: Vec<String>,
}

impl FileClassifier {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = allowed
            .into_iter()
            .map(|ext| {
                let ext = ext.as_ref();
                if ext.starts_with('.') {
                    ext.to_string()
                } else {
                    format!(".{}", ext)
                }
            })
            .collect();
        Self { allowed }
    }

    pub fn is_eligible(&self, file_name: &str) -> bool {
        let ext = extension_of(file_name);
        !ext.is_empty() && self.allowed.iter().any(|allowed| allowed == ext)
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }
}

/// Suffix of the final path element starting at its last dot, or `""`.
///
/// Unlike `Path::extension`, a dotfile such as `.jpg` yields `.jpg`.
pub fn extension_of(file_name: &str) -> &str {
    let base = file_name.rsplit('/').next().unwrap_or(file_name);
    match base.rfind('.') {
        Some(idx) => &base[idx..],
        None => "",
    }
}

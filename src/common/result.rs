use crate::common::error::WtreeError;

/// クレート全体で使用するResult型のエイリアス
///
/// # Examples
///
/// ```
/// use wtree::common::result::WtreeResult;
/// use wtree::common::error::WtreeError;
///
/// fn example_with_error() -> WtreeResult<()> {
///     Err(WtreeError::internal_error("Something went wrong"))
/// }
/// assert!(example_with_error().is_err());
/// ```
pub type WtreeResult<T> = Result<T, WtreeError>;

/// OptionをWtreeResultに変換するヘルパー
pub trait OptionExt<T> {
    /// Noneの場合にValidationErrorを返す
    ///
    /// ```
    /// use wtree::common::result::OptionExt;
    ///
    /// let none_value: Option<String> = None;
    /// assert!(none_value.ok_or_validation_error("Missing 'name' attribute").is_err());
    /// ```
    fn ok_or_validation_error(self, message: impl Into<String>) -> WtreeResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_validation_error(self, message: impl Into<String>) -> WtreeResult<T> {
        self.ok_or_else(|| WtreeError::validation_error(message))
    }
}

/// 標準のResult型をWtreeResultに変換するヘルパー
pub trait ResultExt<T, E> {
    /// I/Oエラーをパス付きのFileSystemErrorに変換する
    fn with_filesystem_error(
        self,
        message: impl Into<String>,
        path: Option<std::path::PathBuf>,
    ) -> WtreeResult<T>
    where
        E: Into<std::io::Error>;
}

impl<T, E> ResultExt<T, E> for Result<T, E> {
    fn with_filesystem_error(
        self,
        message: impl Into<String>,
        path: Option<std::path::PathBuf>,
    ) -> WtreeResult<T>
    where
        E: Into<std::io::Error>,
    {
        self.map_err(|e| WtreeError::filesystem_error_with_source(message, path, e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_option_ext_ok_or_validation_error() {
        let none_value: Option<String> = None;
        let result = none_value.ok_or_validation_error("required");

        if let Err(WtreeError::ValidationError { message, .. }) = result {
            assert_eq!(message, "required");
        } else {
            panic!("Expected ValidationError");
        }

        let some_value = Some(3);
        assert_eq!(some_value.ok_or_validation_error("required").unwrap(), 3);
    }

    #[test]
    fn test_result_ext_with_filesystem_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let result: Result<String, std::io::Error> = Err(io_error);
        let path = Some(PathBuf::from("/test/path"));

        match result.with_filesystem_error("reading cache", path) {
            Err(WtreeError::FileSystemError { path: Some(p), .. }) => {
                assert_eq!(p, PathBuf::from("/test/path"))
            }
            other => panic!("Expected FileSystemError, got {:?}", other),
        }
    }
}

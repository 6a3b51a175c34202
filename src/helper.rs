// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs::write;
use std::path::PathBuf;

use tempfile::tempdir;

use crate::error::Fallible;

/// An empty directory that outlives the test that made it.
pub fn create_tmp_directory() -> Fallible<String> {
    let target: PathBuf = tempdir()?.keep().canonicalize()?;
    Ok(target.display().to_string())
}

/// A fresh collection directory containing `name` with the given contents.
pub fn create_tmp_directory_with(name: &str, contents: &str) -> Fallible<(String, PathBuf)> {
    let directory = create_tmp_directory()?;
    let path = PathBuf::from(&directory).join(name);
    write(&path, contents)?;
    Ok((directory, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tmp_directory() -> Fallible<()> {
        let directory = create_tmp_directory()?;
        assert!(PathBuf::from(directory).is_dir());
        Ok(())
    }

    #[test]
    fn test_create_tmp_directory_with() -> Fallible<()> {
        let (directory, path) = create_tmp_directory_with("cards.json", "[]")?;
        assert!(path.starts_with(&directory));
        assert_eq!(std::fs::read_to_string(path)?, "[]");
        Ok(())
    }
}

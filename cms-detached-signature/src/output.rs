// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Writing signatures to files.

use {
    crate::{
        error::{Result, SignatureError},
        identity::SigningIdentity,
        signing::SignatureBuilder,
    },
    log::info,
    std::{io::Write, path::Path},
};

/// Write `data` to `path`, replacing it only once fully written.
///
/// Data goes to a temporary file in the destination directory which is then
/// renamed over `path`. If anything fails the temporary file is removed and
/// `path` is left untouched.
pub fn write_atomically(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path)
        .map_err(|e| SignatureError::Io(e.error))?;

    Ok(())
}

/// Produce a detached signature of the file at `input` and write it to `output`.
///
/// No output file is created when signing fails.
pub fn sign_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    builder: &SignatureBuilder,
    identity: &SigningIdentity,
) -> Result<()> {
    let content = std::fs::read(input.as_ref())?;
    let signature = builder.sign(&content, identity)?;

    write_atomically(output.as_ref(), &signature)?;

    info!(
        "wrote signature of {} to {}",
        input.as_ref().display(),
        output.as_ref().display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{error::ErrorKind, signing::SigningSettings, testutil::*, verify},
        httpmock::prelude::*,
    };

    #[test]
    fn sign_to_file() {
        crate::provider::install_default();

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("document.txt");
        let output = dir.path().join("document.txt.p7s");
        std::fs::write(&input, HELLO_CYPHER).unwrap();

        sign_file(&input, &output, &SignatureBuilder::default(), &rossi_identity()).unwrap();

        let der = std::fs::read(&output).unwrap();
        let report = verify::verify_detached(&der, HELLO_CYPHER, false).unwrap();
        assert_eq!(report.verified_count(), 1);

        // Only the input and the signature remain.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");

        write_atomically(&path, b"first").unwrap();
        write_atomically(&path, b"second").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
    }

    #[test]
    fn no_output_on_failure() {
        crate::provider::install_default();

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("document.txt");
        let output = dir.path().join("document.txt.p7s");
        std::fs::write(&input, HELLO_CYPHER).unwrap();

        let mut settings = SigningSettings::default();
        settings.set_time_stamp_provider(TestTsa::failing());

        let err = sign_file(
            &input,
            &output,
            &SignatureBuilder::new(settings),
            &rossi_identity(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn time_stamp_server_error() {
        crate::provider::install_default();

        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/tsa");
            then.status(500);
        });

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("document.txt");
        let output = dir.path().join("document.txt.p7s");
        std::fs::write(&input, HELLO_CYPHER).unwrap();

        let mut settings = SigningSettings::default();
        settings.set_time_stamp_url(server.url("/tsa")).unwrap();

        let err = sign_file(
            &input,
            &output,
            &SignatureBuilder::new(settings),
            &rossi_identity(),
        )
        .unwrap_err();

        mock.assert();
        assert!(matches!(
            err,
            SignatureError::Network {
                status: Some(500),
                ..
            }
        ));
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_input() {
        crate::provider::install_default();

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.p7s");

        let err = sign_file(
            dir.path().join("absent"),
            &output,
            &SignatureBuilder::default(),
            &rossi_identity(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!output.exists());
    }

    #[test]
    fn missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_atomically(dir.path().join("absent").join("out.bin"), b"data").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Io);
    }
}

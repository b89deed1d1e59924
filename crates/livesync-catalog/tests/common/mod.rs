#![allow(dead_code)]

use std::{fs, io::Write, path::Path};

use flate2::{Compression, write::GzEncoder};
use livesync_catalog::{
    ConfigManager, LibraryManager, MissingPolicy,
    library_config::{DatabaseBackend, LibraryConfigBuilder},
};

pub fn live_set(tempo: f64, version: &str) -> Vec<u8> {
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Ableton MajorVersion="5" Creator="Ableton Live {version}">
  <LiveSet>
    <MasterTrack>
      <DeviceChain>
        <Mixer>
          <Tempo>
            <Manual Value="{tempo}" />
          </Tempo>
        </Mixer>
      </DeviceChain>
    </MasterTrack>
  </LiveSet>
</Ableton>
"#
    );

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(xml.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

pub fn write_set(dir: &Path, name: &str, tempo: f64) {
    fs::write(dir.join(name), live_set(tempo, "11.3.4")).unwrap();
}

pub fn config(source: &Path, database: &Path, policy: MissingPolicy) -> LibraryConfigBuilder {
    let mut builder = LibraryConfigBuilder::default();
    builder
        .source_dir(source)
        .database(DatabaseBackend::Sqlite(database.to_path_buf()))
        .missing_files(policy)
        .decode_workers(2usize);
    builder
}

pub fn build(builder: &LibraryConfigBuilder) -> LibraryManager {
    LibraryManager::new(ConfigManager::from(builder.build().unwrap())).unwrap()
}

pub fn manager(source: &Path, database: &Path, policy: MissingPolicy) -> LibraryManager {
    build(&config(source, database, policy))
}

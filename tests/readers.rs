use std::fs;
use std::path::{Path, PathBuf};

use approx::assert_abs_diff_eq;
use ndarray::array;
use rascal_readers::{read_file, resolve_path, Dataset, ReaderKind};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn ort(samples: &[&str]) -> String {
    let mut text = String::from(
        "# # ORSO reflectivity data file | 1.1 standard | YAML encoding | https://www.reflectometry.org/\n",
    );
    for (i, sample) in samples.iter().enumerate() {
        if i > 0 {
            text.push_str(&format!("# data_set: {i}\n"));
        }
        text.push_str(&format!("# data_source:\n#   sample:\n#     name: {sample}\n"));
        text.push_str("# # Qz R sR sQz\n");
        text.push_str("0.010 1.00 0.10 0.001\n0.020 0.50 0.05 0.001\n");
    }
    text
}

#[test]
fn csv_with_and_without_header() {
    let dir = tempfile::tempdir().unwrap();
    let with = read_file(write(&dir, "with.csv", "a,b\n1,2\n3,4")).unwrap();
    let without = read_file(write(&dir, "without.txt", "1,2\n3,4")).unwrap();

    assert_eq!(with, vec![Dataset::new("with", array![[1.0, 2.0], [3.0, 4.0]])]);
    assert_eq!(without[0].data, with[0].data);
    assert_eq!(without[0].name, "without");
}

#[test]
fn unknown_extension_reads_as_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "orso_poly.xyz", "0.01\t1.0\t0.1\n0.02\t0.5\t0.05\n");
    assert_eq!(resolve_path(&path), ReaderKind::Text);
    let data = read_file(&path).unwrap();
    assert_eq!(data[0].data.dim(), (2, 3));
}

#[test]
fn asc_bin_centring_through_registry() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "hist.ASC", "0,1\n2,1\n4,0\n6,1\n");
    let data = read_file(&path).unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].name, "hist");
    assert_eq!(data[0].data, array![[1.0, 1.0], [3.0, 1.0], [4.0, 0.0], [6.0, 1.0]]);
}

#[test]
fn ort_repeated_sample_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "multi.ort", &ort(&["A", "A", "B"]));
    let data = read_file(&path).unwrap();
    let names: Vec<_> = data.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, ["A", "A-1", "B"]);
    for ds in &data {
        assert_eq!(ds.data.dim(), (2, 4));
    }
    assert_abs_diff_eq!(data[2].data[[1, 1]], 0.5);
}

#[test]
fn ort_counters_do_not_leak_between_reads() {
    let dir = tempfile::tempdir().unwrap();
    let first = write(&dir, "first.ort", &ort(&["A", "A"]));
    let second = write(&dir, "second.ort", &ort(&["A"]));
    assert_eq!(read_file(&first).unwrap()[1].name, "A-1");
    assert_eq!(read_file(&second).unwrap()[0].name, "A");
    assert_eq!(read_file(&first).unwrap()[1].name, "A-1");
}

#[test]
fn comments_read_the_same_for_every_delimiter() {
    let dir = tempfile::tempdir().unwrap();
    let comma = read_file(write(&dir, "c.csv", "1,2\n  # note\n3,4 # last\n")).unwrap();
    let spaced = read_file(write(&dir, "s.dat", "1 2\n  # note\n3 4 # last\n")).unwrap();
    assert_eq!(comma[0].data, array![[1.0, 2.0], [3.0, 4.0]]);
    assert_eq!(spaced[0].data, comma[0].data);
}

#[test]
fn ort_trailing_comment_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let mut text = ort(&["A", "B"]);
    text.push_str("# end of file\n");
    let data = read_file(write(&dir, "tail.ort", &text)).unwrap();
    let names: Vec<_> = data.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, ["A", "B"]);
}

#[test]
fn rereading_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let paths = [
        write(&dir, "a.dat", "# q r dr\n0.1 1 0.1\n0.2 0.5 0.05\n"),
        write(&dir, "b.asc", "0,3,1\n1,0,0\n2,3,1\n"),
        write(&dir, "c.ort", &ort(&["x", "x"])),
    ];
    for path in &paths {
        assert_eq!(read_file(path).unwrap(), read_file(path).unwrap());
    }
}

#[test]
fn malformed_files_fail_without_partial_results() {
    let dir = tempfile::tempdir().unwrap();
    let cases = [
        write(&dir, "ragged.csv", "1,2,3\n4,5\n6,7,8\n"),
        write(&dir, "token.dat", "1 2\n3 four\n"),
        write(&dir, "ragged.asc", "0,1\n1,2,3\n"),
        write(&dir, "empty.csv", ""),
        write(&dir, "not_orso.ort", "0.1 1 0.1\n"),
    ];
    for path in &cases {
        let err = read_file(path).unwrap_err();
        assert_eq!(err.path, *path);
        assert!(err.to_string().contains(&path.display().to_string()));
    }

    // Second ORSO block is broken; the first must not be returned either.
    let mut text = ort(&["good"]);
    text.push_str("# data_set: 1\n0.1 one 0.1 0.1\n");
    assert!(read_file(write(&dir, "half.ort", &text)).is_err());
}

#[test]
fn missing_file_is_a_format_error() {
    let err = read_file(Path::new("/definitely/not/here.asc")).unwrap_err();
    assert_eq!(err.path, Path::new("/definitely/not/here.asc"));
}

#[cfg(feature = "hdf5")]
#[test]
fn nexus_file_round_trip() {
    use hdf5::types::VarLenUnicode;

    fn text_attr(loc: &hdf5::Location, name: &str, value: &str) {
        let value: VarLenUnicode = value.parse().unwrap();
        loc.new_attr::<VarLenUnicode>()
            .shape(())
            .create(name)
            .unwrap()
            .write_scalar(&value)
            .unwrap();
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("INTER_61440_IvsQ_binned.nxs");
    {
        let file = hdf5::File::create(&path).unwrap();
        let entry = file.create_group("mantid_workspace_1").unwrap();
        text_attr(&entry, "NX_class", "NXentry");
        for (name, offset) in [("a_data", 0.0), ("b_data", 1.0)] {
            let group = entry.create_group(name).unwrap();
            text_attr(&group, "NX_class", "NXdata");
            text_attr(&group, "signal", "values");
            text_attr(&group, "axes", "axis1");
            let edges = [offset, offset + 1.0, offset + 2.0, offset + 3.0];
            let values = [1.0, 0.5, 0.25];
            let errors = [0.1, 0.05, 0.025];
            group.new_dataset_builder().with_data(&edges[..]).create("axis1").unwrap();
            group.new_dataset_builder().with_data(&values[..]).create("values").unwrap();
            group.new_dataset_builder().with_data(&errors[..]).create("errors").unwrap();
        }
    }

    let data = read_file(&path).unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0].name, "a_data");
    assert_eq!(data[0].data.dim(), (3, 3));
    assert_abs_diff_eq!(
        data[1].data,
        array![[1.5, 1.0, 0.1], [2.5, 0.5, 0.05], [3.5, 0.25, 0.025]]
    );
}

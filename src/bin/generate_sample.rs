use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;

/// Rough reflectivity curve: Fresnel decay above the critical edge with
/// Kiessig fringes from a film of `thickness` ångström.
fn reflectivity(q: f64, q_crit: f64, thickness: f64) -> f64 {
    if q <= q_crit {
        return 1.0;
    }
    let fresnel = (q_crit / (2.0 * q)).powi(4) * 16.0;
    let fringes = 1.0 + 0.4 * (q * thickness).cos();
    (fresnel * fringes).min(1.0)
}

/// Seeded Gaussian noise (splitmix64 stream through Box-Muller).
struct Noise(u64);

impl Noise {
    fn uniform(&mut self) -> f64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        (z >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Zero-mean sample with standard deviation `sigma`.
    fn gauss(&mut self, sigma: f64) -> f64 {
        let u1 = self.uniform().max(1e-15);
        let u2 = self.uniform();
        sigma * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }
}

/// One simulated curve: rows of `[Q, R, dR]`.
fn simulate(noise: &mut Noise, q: &[f64], thickness: f64) -> Vec<[f64; 3]> {
    q.iter()
        .map(|&q| {
            let r = reflectivity(q, 0.0102, thickness);
            let dr = 0.05 * r;
            [q, (r + noise.gauss(dr)).abs(), dr]
        })
        .collect()
}

fn q_grid(n: usize, start: f64, stop: f64) -> Vec<f64> {
    let step = (stop - start) / (n - 1) as f64;
    (0..n).map(|i| start + i as f64 * step).collect()
}

fn write_dat(path: &Path, rows: &[[f64; 3]]) -> Result<()> {
    let mut out = String::from("# Q(1/A)  R  dR\n");
    for [q, r, dr] in rows {
        writeln!(out, "{q:.6e}  {r:.6e}  {dr:.6e}")?;
    }
    fs::write(path, out).with_context(|| format!("writing {}", path.display()))
}

fn write_csv(path: &Path, rows: &[[f64; 3]]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["Q", "R", "dR"])?;
    for row in rows {
        writer.write_record(row.iter().map(|v| format!("{v:.6e}")))?;
    }
    writer.flush()?;
    Ok(())
}

/// Histogram with left bin edges; the last few bins are left empty.
fn write_asc(path: &Path, noise: &mut Noise) -> Result<()> {
    let edges = q_grid(60, 0.01, 0.25);
    let mut out = String::new();
    for (i, &edge) in edges.iter().enumerate() {
        let counts = if i + 5 >= edges.len() {
            0.0
        } else {
            (1e5 * reflectivity(edge, 0.0102, 250.0) + noise.gauss(5.0)).max(1.0).round()
        };
        writeln!(out, "{edge:.6e},{counts:.6e},{:.6e}", counts.sqrt())?;
    }
    fs::write(path, out).with_context(|| format!("writing {}", path.display()))
}

/// Two ORSO data blocks sharing one sample name.
fn write_ort(path: &Path, up: &[[f64; 3]], down: &[[f64; 3]]) -> Result<()> {
    let mut out = String::from(
        "# # ORSO reflectivity data file | 1.1 standard | YAML encoding | https://www.reflectometry.org/\n\
         # data_source:\n\
         #   owner: {name: generate_sample}\n\
         #   experiment: {title: synthetic, instrument: none, start_date: 2024-01-01, probe: neutron}\n\
         #   sample:\n\
         #     name: Ni film\n\
         #   measurement:\n\
         #     instrument_settings: {incident_angle: {magnitude: 0.5, unit: deg}, polarization: po}\n\
         # reduction:\n\
         #   software: {name: generate_sample}\n\
         # columns:\n\
         # - {name: Qz, unit: 1/angstrom, physical_quantity: wavevector transfer}\n\
         # - {name: R, physical_quantity: reflectivity}\n\
         # - {name: sR, physical_quantity: standard deviation of reflectivity}\n\
         # # Qz (1/angstrom)  R  sR\n",
    );
    for [q, r, dr] in up {
        writeln!(out, "{q:.6e} {r:.6e} {dr:.6e}")?;
    }
    out.push_str(
        "# data_set: 1\n\
         # data_source:\n\
         #   measurement:\n\
         #     instrument_settings: {polarization: mo}\n\
         # # Qz (1/angstrom)  R  sR\n",
    );
    for [q, r, dr] in down {
        writeln!(out, "{q:.6e} {r:.6e} {dr:.6e}")?;
    }
    fs::write(path, out).with_context(|| format!("writing {}", path.display()))
}

#[cfg(feature = "hdf5")]
fn write_nxs(path: &Path, rows: &[[f64; 3]]) -> Result<()> {
    use hdf5::types::VarLenUnicode;

    fn text_attr(loc: &hdf5::Location, name: &str, value: &str) -> Result<()> {
        let value: VarLenUnicode = value.parse()?;
        loc.new_attr::<VarLenUnicode>()
            .shape(())
            .create(name)?
            .write_scalar(&value)?;
        Ok(())
    }

    let file = hdf5::File::create(path)?;
    let entry = file.create_group("entry")?;
    text_attr(&entry, "NX_class", "NXentry")?;
    let data = entry.create_group("IvsQ")?;
    text_attr(&data, "NX_class", "NXdata")?;
    text_attr(&data, "signal", "R")?;
    text_attr(&data, "axes", "Qz")?;

    // Axis stored as bin edges around each point.
    let mut edges: Vec<f64> = rows.windows(2).map(|w| (w[0][0] + w[1][0]) / 2.0).collect();
    if let (Some(first), Some(last)) = (rows.first(), rows.last()) {
        let half = edges.first().map_or(0.0, |e| e - first[0]);
        edges.insert(0, first[0] - half);
        edges.push(last[0] + half);
    }
    let r: Vec<f64> = rows.iter().map(|row| row[1]).collect();
    let dr: Vec<f64> = rows.iter().map(|row| row[2]).collect();
    data.new_dataset_builder().with_data(edges.as_slice()).create("Qz")?;
    data.new_dataset_builder().with_data(r.as_slice()).create("R")?;
    data.new_dataset_builder().with_data(dr.as_slice()).create("R_errors")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let out_dir = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| "samples".into()));
    fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;

    let mut noise = Noise(42);
    let q = q_grid(120, 0.005, 0.3);
    let film = simulate(&mut noise, &q, 250.0);
    let thin = simulate(&mut noise, &q, 120.0);

    let mut written = vec![out_dir.join("moto.dat"), out_dir.join("film.csv")];
    write_dat(&written[0], &film)?;
    write_csv(&written[1], &thin)?;

    let asc = out_dir.join("histogram.asc");
    write_asc(&asc, &mut noise)?;
    written.push(asc);

    let ort = out_dir.join("spin_states.ort");
    write_ort(&ort, &film, &thin)?;
    written.push(ort);

    #[cfg(feature = "hdf5")]
    {
        let nxs = out_dir.join("IvsQ_binned.nxs");
        write_nxs(&nxs, &film)?;
        written.push(nxs);
    }

    // Read everything back through the registry as a smoke check.
    for path in &written {
        let kind = rascal_readers::resolve_path(path);
        for ds in rascal_readers::read_file(path)? {
            info!("{} [{kind}] {}: {} x {}", path.display(), ds.name, ds.len(), ds.ncols());
        }
    }
    println!("Wrote {} sample files to {}", written.len(), out_dir.display());
    Ok(())
}

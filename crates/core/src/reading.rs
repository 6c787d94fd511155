//! Source records and the submission payloads derived from them.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::form::FormPayload;

/// One prepaid customer as returned by the bulk fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub idpel: String,
    #[serde(default)]
    pub nama: String,
    #[serde(default)]
    pub tarif: String,
    #[serde(default)]
    pub daya: String,
    /// Routing code the CLI groups by.
    #[serde(default)]
    pub kdrbm: String,
    #[serde(default)]
    pub blth: String,
    #[serde(default)]
    pub merk_meter: String,
    #[serde(default)]
    pub nomor_meter: String,
}

/// Fields of the primary meter reading report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MeterReading {
    pub idpel: String,
    pub blth: String,
    pub tglbaca: String,
    pub sisakwh: String,
    pub kwhkomulatif: String,
    pub latitude: String,
    pub longitude: String,
    pub jumlah_terminal: String,
    pub indikatordisplay: String,
    pub keypad: String,
    pub cosphi: String,
    pub lcd: String,
    pub kdbaca: String,
    pub kdbaca2: String,
    pub kdbaca3: String,
    pub namafoto: String,
    pub tegangan: String,
    pub tutup_meter: String,
    pub arus: String,
    pub tarifindex: String,
    pub kondisi_segel: String,
    pub relay: String,
    pub indikator_temper: String,
    pub akurasi: String,
    pub powerlimit: String,
    pub transaksiby: String,
    pub status_temper: String,
}

impl MeterReading {
    /// Build a plausible reading for `record`.
    ///
    /// `timestamp` and `(latitude, longitude)` come from the shared
    /// generators; the remaining measurements are drawn from `rng`.
    pub fn synthesize<R: Rng>(
        record: &SourceRecord,
        timestamp: String,
        (latitude, longitude): (String, String),
        rng: &mut R,
    ) -> Self {
        Self {
            idpel: record.idpel.clone(),
            blth: record.blth.clone(),
            tglbaca: timestamp,
            sisakwh: format!("{:.2}", rng.random_range(4.0..110.0)),
            kwhkomulatif: rng.random_range(500..=3000).to_string(),
            latitude,
            longitude,
            jumlah_terminal: "5".to_string(),
            indikatordisplay: "0".to_string(),
            keypad: "Normal".to_string(),
            cosphi: format!("{:.2}", rng.random_range(0.5..1.0)),
            lcd: "Normal".to_string(),
            kdbaca: "NORMAL".to_string(),
            kdbaca2: String::new(),
            kdbaca3: String::new(),
            namafoto: String::new(),
            tegangan: rng.random_range(195..=225).to_string(),
            tutup_meter: "0".to_string(),
            arus: rng.random_range(0..=1).to_string(),
            tarifindex: tariff_index(&record.daya).to_string(),
            kondisi_segel: "Ada".to_string(),
            relay: "Tutup".to_string(),
            indikator_temper: "Tidak Nyala".to_string(),
            akurasi: rng.random_range(4..=19).to_string(),
            powerlimit: power_limit(&record.daya),
            transaksiby: String::new(),
            status_temper: "0".to_string(),
        }
    }

    pub fn to_form(&self) -> FormPayload {
        FormPayload::new()
            .field("tglbaca", &self.tglbaca)
            .field("sisakwh", &self.sisakwh)
            .field("kwhkomulatif", &self.kwhkomulatif)
            .field("latitude", &self.latitude)
            .field("jumlah_terminal", &self.jumlah_terminal)
            .field("indikatordisplay", &self.indikatordisplay)
            .field("keypad", &self.keypad)
            .field("cosphi", &self.cosphi)
            .field("lcd", &self.lcd)
            .field("kdbaca", &self.kdbaca)
            .field("kdbaca2", &self.kdbaca2)
            .field("kdbaca3", &self.kdbaca3)
            .field("namafoto", &self.namafoto)
            .field("blth", &self.blth)
            .field("tegangan", &self.tegangan)
            .field("tutup_meter", &self.tutup_meter)
            .field("longitude", &self.longitude)
            .field("arus", &self.arus)
            .field("tarifindex", &self.tarifindex)
            .field("kondisi_segel", &self.kondisi_segel)
            .field("relay", &self.relay)
            .field("indikator_temper", &self.indikator_temper)
            .field("akurasi", &self.akurasi)
            .field("idpel", &self.idpel)
            .field("powerlimit", &self.powerlimit)
            .field("transaksiby", &self.transaksiby)
            .field("status_temper", &self.status_temper)
    }
}

/// Fields shared by every auxiliary photo upload of one reading.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhotoUpload {
    pub idpel: String,
    pub blth: String,
    pub unitup: String,
    pub namafile: String,
    /// Base64 photo content.
    pub filefoto: String,
    pub transaksiby: String,
}

impl PhotoUpload {
    pub fn for_record(record: &SourceRecord, unitup: &str, filefoto: String) -> Self {
        Self {
            idpel: record.idpel.clone(),
            blth: record.blth.clone(),
            unitup: unitup.to_string(),
            namafile: format!("{}_{}.jpg", record.idpel, record.blth),
            filefoto,
            transaksiby: String::new(),
        }
    }

    pub fn to_form(&self) -> FormPayload {
        FormPayload::new()
            .field("idpel", &self.idpel)
            .field("blth", &self.blth)
            .field("unitup", &self.unitup)
            .field("namafile", &self.namafile)
            .field("filefoto", &self.filefoto)
            .field("transaksiby", &self.transaksiby)
    }
}

/// Leading integer of a power rating such as `"900"` or `"1300VA"`; 0 if none.
fn parse_power_va(daya: &str) -> i64 {
    let trimmed = daya.trim_start();
    let digits_end = trimmed
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(trimmed.len(), |(i, _)| i);
    trimmed[..digits_end].parse().unwrap_or(0)
}

/// Tariff index code for a power rating in VA. Unknown ratings map to `"01"`.
pub fn tariff_index(daya: &str) -> &'static str {
    match parse_power_va(daya) {
        450 => "01",
        900 => "02",
        1300 => "03",
        2200 => "04",
        3500 => "05",
        4400 => "06",
        5500 => "07",
        7700 => "08",
        11000 => "09",
        _ => "01",
    }
}

/// Power limit in kVA-ish units: `daya * 0.0017`, two decimals.
pub fn power_limit(daya: &str) -> String {
    format!("{:.2}", parse_power_va(daya) as f64 * 0.0017)
}

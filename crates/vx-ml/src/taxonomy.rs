//! Sound taxonomy
//!
//! Ordered catalogue of candidate descriptions scanned when a request names
//! no sounds. Labels follow the AudioSet ontology, written as lowercase noun
//! or verb phrases. Order matters: threshold selection keeps it, and it
//! breaks ties in the fallback ranking.

use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use vx_core::Description;

use crate::error::{MlError, MlResult};

/// Version tag of the built-in catalogue
pub const BUILTIN_TAXONOMY_VERSION: &str = "sound-atlas-2025.1";

/// Built-in catalogue, grouped by family
pub const SOUND_ATLAS: &[&str] = &[
    // Plucked strings
    "plucked string instrument",
    "guitar playing",
    "acoustic guitar strumming",
    "electric guitar riff",
    "electric guitar distorted",
    "clean electric guitar",
    "bass guitar",
    "slap bass",
    "fingerpicking guitar",
    "ukulele",
    "banjo",
    "mandolin",
    "sitar",
    "lute",
    "zither",
    "harp plucking",
    "steel guitar",
    "slide guitar",
    "twelve string guitar",
    // Keyboards
    "keyboard musical instrument",
    "piano playing",
    "grand piano",
    "upright piano",
    "electric piano",
    "rhodes piano",
    "organ",
    "church organ",
    "hammond organ",
    "synthesizer",
    "synthesizer pad",
    "synthesizer lead",
    "harpsichord",
    "clavichord",
    "celesta",
    "melodica",
    // Percussion
    "percussion instrument",
    "drum kit",
    "drum beating",
    "snare drum",
    "snare drum rimshot",
    "bass drum",
    "kick drum",
    "hi-hat cymbal",
    "crash cymbal",
    "ride cymbal",
    "cymbals crashing",
    "tom drum",
    "floor tom",
    "gong",
    "marimba",
    "xylophone",
    "vibraphone",
    "timpani",
    "cowbell",
    "rattle instrument",
    "wood block",
    "tambourine",
    "bongo drums",
    "conga drum",
    "djembe",
    "cajon",
    "shaker",
    "claves",
    "triangle instrument",
    "chimes",
    "tubular bells",
    "steel drum",
    "tabla",
    "electronic drum machine",
    "drum loop",
    "percussion loop",
    // Brass
    "brass instrument",
    "trumpet",
    "trumpet with mute",
    "trombone",
    "french horn",
    "tuba",
    "cornet",
    "flugelhorn",
    "euphonium",
    "brass section",
    // Bowed strings
    "bowed string instrument",
    "violin playing",
    "violin pizzicato",
    "viola",
    "cello",
    "double bass bowed",
    "string section",
    "string orchestra",
    "fiddle",
    "erhu",
    // Woodwinds
    "wind instrument",
    "woodwind instrument",
    "flute",
    "piccolo",
    "recorder instrument",
    "clarinet",
    "bass clarinet",
    "oboe",
    "english horn",
    "bassoon",
    "contrabassoon",
    "saxophone",
    "alto saxophone",
    "tenor saxophone",
    "soprano saxophone",
    "baritone saxophone",
    "pan flute",
    // Free reed / bellows
    "harmonica",
    "blues harmonica",
    "accordion",
    "concertina",
    "bandoneon",
    "harmonium",
    // World
    "bagpipes",
    "didgeridoo",
    "shofar",
    "kalimba",
    "mbira",
    "shamisen",
    "koto",
    "pipa",
    "oud",
    "bouzouki",
    "balalaika",
    "gamelan",
    "steel pan",
    "hang drum",
    // Electronic
    "theremin",
    "electronic music",
    "electronic beat",
    "synth bass",
    "808 bass",
    "909 drum",
    "arpeggiator",
    "vocoder",
    "turntable scratching",
    "scratching performance technique",
    "sampler",
    "drum and bass beat",
    "dubstep wobble",
    // Vocals
    "singing",
    "male singing",
    "female singing",
    "choir singing",
    "vocal harmony",
    "background vocals",
    "lead vocals",
    "rapping",
    "beatboxing",
    "humming",
    "whistling",
    "yodeling",
    "opera singing",
    "falsetto",
    "vocal runs",
    "autotune vocals",
    // Bells
    "bell ringing",
    "church bell",
    "jingle bell",
    "singing bowl",
    "glockenspiel",
    "handbell",
    "cowbell",
    "wind chimes",
    // Ensembles
    "orchestra playing",
    "musical ensemble",
    "jazz band",
    "rock band",
    "marching band",
    "big band",
    "chamber music",
    "string quartet",
    // Roles / textures
    "bass instrument role",
    "rhythm section",
    "melody line",
    "lead instrument",
    "accompaniment",
    "drone sound",
    "ambient pad",
    "sound effects",
    "noise texture",
];

/// Versioned, ordered list of descriptions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundTaxonomy {
    pub version: String,
    pub labels: Vec<Description>,
}

static BUILTIN: OnceLock<SoundTaxonomy> = OnceLock::new();

impl SoundTaxonomy {
    /// Taxonomy from explicit labels
    pub fn new<I, S>(version: impl Into<String>, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Description>,
    {
        Self {
            version: version.into(),
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Process-wide built-in catalogue, built on first use
    pub fn builtin() -> &'static SoundTaxonomy {
        BUILTIN.get_or_init(|| SoundTaxonomy::new(BUILTIN_TAXONOMY_VERSION, SOUND_ATLAS.iter().copied()))
    }

    /// Load from a JSON or YAML file (`{ version, labels }`)
    pub fn load<P: AsRef<Path>>(path: P) -> MlResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;

        let taxonomy: SoundTaxonomy = if is_yaml(path) {
            serde_yml::from_str(&text).map_err(|e| MlError::Serialization(e.to_string()))?
        } else {
            serde_json::from_str(&text).map_err(|e| MlError::Serialization(e.to_string()))?
        };

        log::info!(
            "Loaded taxonomy '{}' ({} labels) from {}",
            taxonomy.version,
            taxonomy.len(),
            path.display()
        );
        Ok(taxonomy)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels in catalogue order
    pub fn descriptions(&self) -> &[Description] {
        &self.labels
    }

    pub fn iter(&self) -> impl Iterator<Item = &Description> {
        self.labels.iter()
    }
}

pub(crate) fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
}

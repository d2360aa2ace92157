pub mod bbox;
pub mod building;
pub mod city;
pub mod job;
pub mod status;

pub use bbox::Bbox;
pub use building::{BuildingRecord, ElementKind};
pub use city::{
    department_of, is_city_code, CadastreCount, City, CityDto, EditableData, FrequencyTable,
    ImportDetails, LabelCount,
};
pub use job::{JobId, JobKey, JobKind, JobState, JobStatus};
pub use status::StatusLabel;

pub mod buff_event;
pub mod cast_event;
pub mod damage_event;
pub mod death_event;
pub mod fight;
pub mod heal_event;
pub mod ingest_run;
pub mod player;
pub mod report;

pub mod absence_request;
pub mod audit;
pub mod departement;
pub mod jour_ferie;
pub mod pointage;
pub mod publication;
pub mod role;
pub mod salaire;
pub mod societe;
pub mod todo;
pub mod user;

use actix_web::{web, HttpResponse, Result as ActixResult};
use shared_types::{CreateEmployeeRequest, EmployeeInfo, EmployeesResponse};
use std::sync::Arc;

use crate::database::employees as db;
use crate::database::Database;

pub async fn list_employees(db: web::Data<Arc<Database>>) -> ActixResult<HttpResponse> {
    let employees = db::list_employees(db.async_connection.clone())
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    Ok(HttpResponse::Ok().json(EmployeesResponse { employees }))
}

pub async fn create_employee(
    db: web::Data<Arc<Database>>,
    request: web::Json<CreateEmployeeRequest>,
) -> ActixResult<HttpResponse> {
    let req = request.into_inner();

    if req.name.trim().is_empty() {
        return Err(actix_web::error::ErrorBadRequest(
            "Employee name cannot be empty",
        ));
    }

    let account_number = req.account_number.unwrap_or_default();
    let bank_branch = req.bank_branch.unwrap_or_default();

    let id = db::insert_employee(db.async_connection.clone(), &req.name, &account_number, &bank_branch)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    Ok(HttpResponse::Created().json(EmployeeInfo {
        id,
        name: req.name,
        account_number,
        bank_branch,
    }))
}

pub async fn delete_employee(
    db: web::Data<Arc<Database>>,
    path: web::Path<i64>,
) -> ActixResult<HttpResponse> {
    let id = path.into_inner();

    db::delete_employee(db.async_connection.clone(), id)
        .await
        .map_err(|e| actix_web::error::ErrorInternalServerError(e.to_string()))?;

    Ok(HttpResponse::NoContent().finish())
}

//! Registration of every `/api/v1` handler.
//!
//! Literal segments are registered before parameterised siblings so that,
//! for example, `/admin/expenses/summary` is never parsed as an expense id.

use actix_web::web;

use crate::inbound::http::error::{json_payload_error, path_error, query_payload_error};
use crate::inbound::http::{
    accounts, admin, cart, catalogue, notifications, orders, payments,
};

/// Mount the REST surface onto a scope or app.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_payload_error))
        .app_data(web::QueryConfig::default().error_handler(query_payload_error))
        .app_data(web::PathConfig::default().error_handler(path_error));

    cfg.service(accounts::register)
        .service(accounts::verify)
        .service(accounts::login)
        .service(accounts::refresh)
        .service(accounts::logout)
        .service(accounts::change_password)
        .service(accounts::me)
        .service(accounts::update_me);

    cfg.service(catalogue::list_categories)
        .service(catalogue::list_products)
        .service(catalogue::get_product);

    cfg.service(cart::view_cart)
        .service(cart::add_item)
        .service(cart::set_quantity)
        .service(cart::remove_item)
        .service(cart::clear_cart);

    cfg.service(orders::validate_discount)
        .service(orders::checkout)
        .service(orders::my_orders)
        .service(orders::track_order)
        .service(orders::get_order)
        .service(orders::cancel_order)
        .service(orders::retry_payment)
        .service(orders::payment_status)
        .service(payments::mpesa_callback);

    cfg.service(notifications::list_notifications)
        .service(notifications::unread_count)
        .service(notifications::mark_all_read)
        .service(notifications::mark_read);

    configure_admin(cfg);
}

fn configure_admin(cfg: &mut web::ServiceConfig) {
    use admin::{catalogue, discounts, expenses, orders, reports, stock, users};

    cfg.service(catalogue::list_categories)
        .service(catalogue::create_category)
        .service(catalogue::update_category)
        .service(catalogue::delete_category)
        .service(catalogue::list_products)
        .service(catalogue::create_product)
        .service(catalogue::get_product)
        .service(catalogue::update_product)
        .service(catalogue::remove_product)
        .service(catalogue::create_variant)
        .service(catalogue::update_variant)
        .service(catalogue::delete_variant);

    cfg.service(stock::record_movement)
        .service(stock::list_movements)
        .service(stock::low_stock);

    cfg.service(discounts::list_discounts)
        .service(discounts::create_discount)
        .service(discounts::get_discount)
        .service(discounts::update_discount)
        .service(discounts::delete_discount);

    cfg.service(orders::list_orders)
        .service(orders::get_order)
        .service(orders::update_status)
        .service(orders::cancel_order)
        .service(orders::pos_sale);

    cfg.service(users::online_users)
        .service(users::list_users)
        .service(users::change_role)
        .service(users::lock_user)
        .service(users::unlock_user)
        .service(users::delete_user);

    cfg.service(expenses::list_categories)
        .service(expenses::create_category)
        .service(expenses::update_category)
        .service(expenses::delete_category)
        .service(expenses::expense_summary)
        .service(expenses::list_expenses)
        .service(expenses::create_expense)
        .service(expenses::get_expense)
        .service(expenses::update_expense)
        .service(expenses::delete_expense);

    cfg.service(reports::sales_report);
}

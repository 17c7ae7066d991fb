use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{
            LoginRequest, LoginResponse, OtpDispatch, RegisterRequest, RequestOtpRequest,
            VerifyOtpRequest,
        },
        cart::{AddToCartRequest, CartView, UpdateCartRequest},
        orders::{OrderList, OrderWithItems, UpdateOrderStatusRequest},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        users::{CreateUserRequest, UserList},
    },
    flash::{Flash, FlashLevel},
    middleware::auth::Role,
    models::{CartLine, Order, OrderItem, Product, User},
    response::{ApiResponse, ErrorData, Meta},
    routes::{admin, auth, cart, flash, health, orders, params, products},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::resend_otp,
        auth::confirm_otp,
        auth::login,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        cart::cart_list,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_from_cart,
        orders::list_order,
        orders::checkout,
        orders::get_order,
        flash::take_flash,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        admin::delete_order,
        admin::list_users,
        admin::get_user,
        admin::create_user,
        admin::delete_user
    ),
    components(
        schemas(
            User,
            Role,
            Product,
            CartLine,
            Order,
            OrderItem,
            Flash,
            FlashLevel,
            RegisterRequest,
            RequestOtpRequest,
            VerifyOtpRequest,
            LoginRequest,
            LoginResponse,
            OtpDispatch,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            AddToCartRequest,
            UpdateCartRequest,
            CartView,
            UpdateOrderStatusRequest,
            OrderList,
            OrderWithItems,
            CreateUserRequest,
            UserList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            Meta,
            ErrorData,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartView>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<UserList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Registration, email verification and login"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Checkout and order history"),
        (name = "Flash", description = "One-shot notices"),
        (name = "Admin", description = "Order administration"),
        (name = "Users", description = "Account administration"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
